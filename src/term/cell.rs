//! Cell and attribute model
//!
//! The atomic grid unit: a character plus a 16-color palette attribute.
//! Double-width characters occupy two cells; the trailing cell holds a
//! continuation sentinel and is never independently drawn.

use bitflags::bitflags;

/// Default foreground palette index (white).
pub const DEFAULT_FG: u8 = 7;
/// Default background palette index (black).
pub const DEFAULT_BG: u8 = 0;

/// Sentinel stored in the trailing half of a double-width pair.
const CONTINUATION: char = '\0';

bitflags! {
    /// Style flags carried by an attribute.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u8 {
        const BOLD      = 0b001;
        const UNDERLINE = 0b010;
        const REVERSE   = 0b100;
    }
}

/// Cell attribute: foreground/background palette index plus style flags.
///
/// Indices are always 0-15. Extended SGR color requests are degraded to
/// this range before they are stored (see [`degrade_256`] and
/// [`degrade_rgb`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attr {
    pub fg: u8,
    pub bg: u8,
    pub flags: AttrFlags,
}

impl Default for Attr {
    fn default() -> Self {
        Self {
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
            flags: AttrFlags::empty(),
        }
    }
}

impl Attr {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn bold(&self) -> bool {
        self.flags.contains(AttrFlags::BOLD)
    }

    pub fn underline(&self) -> bool {
        self.flags.contains(AttrFlags::UNDERLINE)
    }

    pub fn reverse(&self) -> bool {
        self.flags.contains(AttrFlags::REVERSE)
    }

    /// Foreground index after the bold-brightening rule: bold plus a
    /// normal-intensity index selects the bright variant. Applies to the
    /// foreground only.
    pub fn effective_fg(&self) -> u8 {
        if self.bold() && self.fg < 8 {
            self.fg + 8
        } else {
            self.fg
        }
    }

    /// Background index; never brightened by bold.
    pub fn effective_bg(&self) -> u8 {
        self.bg
    }
}

/// Degrade a 256-color index to the 16-entry palette.
///
/// 0-15 map directly. The 6x6x6 color cube (16-231) falls into the
/// default-white bucket; grayscale ramp entries go to black (232-243)
/// or bright white (244-255).
pub fn degrade_256(index: u8) -> u8 {
    match index {
        0..=15 => index,
        16..=231 => DEFAULT_FG,
        232..=243 => 0,
        244..=255 => 15,
    }
}

/// Degrade a 24-bit color to the 16-entry palette by luminance.
pub fn degrade_rgb(r: u8, g: u8, b: u8) -> u8 {
    let lum = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
    match lum {
        0..=84 => 0,
        85..=169 => DEFAULT_FG,
        _ => 15,
    }
}

/// A single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub attr: Attr,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Attr::default())
    }
}

impl Cell {
    /// A blank cell carrying the given attribute.
    pub fn blank(attr: Attr) -> Self {
        Self { ch: ' ', attr }
    }

    /// The trailing half of a double-width pair.
    pub fn continuation(attr: Attr) -> Self {
        Self {
            ch: CONTINUATION,
            attr,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.ch == CONTINUATION
    }

    /// True for the leading half of a double-width pair.
    pub fn is_wide_lead(&self) -> bool {
        use unicode_width::UnicodeWidthChar;
        !self.is_continuation() && self.ch.width() == Some(2)
    }

    /// Character to draw; continuation cells render as nothing and map
    /// to a space here for consumers that iterate every cell.
    pub fn display_char(&self) -> char {
        if self.is_continuation() {
            ' '
        } else {
            self.ch
        }
    }
}

/// An RGB color value resolved from the palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Immutable 16-entry ANSI palette (8 normal + 8 bright).
///
/// Owned by the consumer rather than living in process-wide state, so
/// multiple sessions with different palettes can coexist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub colors: [Rgb; 16],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: [
                Rgb(0x00, 0x00, 0x00),
                Rgb(0x80, 0x00, 0x00),
                Rgb(0x00, 0x80, 0x00),
                Rgb(0x80, 0x80, 0x00),
                Rgb(0x00, 0x00, 0x80),
                Rgb(0x80, 0x00, 0x80),
                Rgb(0x00, 0x80, 0x80),
                Rgb(0xc0, 0xc0, 0xc0),
                Rgb(0x80, 0x80, 0x80),
                Rgb(0xff, 0x00, 0x00),
                Rgb(0x00, 0xff, 0x00),
                Rgb(0xff, 0xff, 0x00),
                Rgb(0x00, 0x00, 0xff),
                Rgb(0xff, 0x00, 0xff),
                Rgb(0x00, 0xff, 0xff),
                Rgb(0xff, 0xff, 0xff),
            ],
        }
    }
}

impl Palette {
    pub fn rgb(&self, index: u8) -> Rgb {
        self.colors[(index & 0x0f) as usize]
    }

    /// Resolve an attribute to concrete (foreground, background) colors,
    /// applying bold-brightening and the reverse flag.
    pub fn resolve(&self, attr: &Attr) -> (Rgb, Rgb) {
        let fg = self.rgb(attr.effective_fg());
        let bg = self.rgb(attr.effective_bg());
        if attr.reverse() {
            (bg, fg)
        } else {
            (fg, bg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_brightens_foreground_only() {
        let attr = Attr {
            fg: 1,
            bg: 1,
            flags: AttrFlags::BOLD,
        };
        assert_eq!(attr.effective_fg(), 9);
        assert_eq!(attr.effective_bg(), 1);
    }

    #[test]
    fn bold_leaves_bright_foreground_alone() {
        let attr = Attr {
            fg: 12,
            bg: 0,
            flags: AttrFlags::BOLD,
        };
        assert_eq!(attr.effective_fg(), 12);
    }

    #[test]
    fn degrade_256_buckets() {
        assert_eq!(degrade_256(0), 0);
        assert_eq!(degrade_256(15), 15);
        assert_eq!(degrade_256(16), DEFAULT_FG);
        assert_eq!(degrade_256(231), DEFAULT_FG);
        assert_eq!(degrade_256(232), 0);
        assert_eq!(degrade_256(243), 0);
        assert_eq!(degrade_256(244), 15);
        assert_eq!(degrade_256(255), 15);
    }

    #[test]
    fn degrade_rgb_by_luminance() {
        assert_eq!(degrade_rgb(0, 0, 0), 0);
        assert_eq!(degrade_rgb(128, 128, 128), DEFAULT_FG);
        assert_eq!(degrade_rgb(255, 255, 255), 15);
    }

    #[test]
    fn continuation_sentinel() {
        let cont = Cell::continuation(Attr::default());
        assert!(cont.is_continuation());
        assert!(!cont.is_wide_lead());
        assert_eq!(cont.display_char(), ' ');

        let wide = Cell {
            ch: '中',
            attr: Attr::default(),
        };
        assert!(wide.is_wide_lead());
    }

    #[test]
    fn reverse_swaps_resolved_colors() {
        let palette = Palette::default();
        let attr = Attr {
            fg: 7,
            bg: 0,
            flags: AttrFlags::REVERSE,
        };
        let (fg, bg) = palette.resolve(&attr);
        assert_eq!(fg, palette.rgb(0));
        assert_eq!(bg, palette.rgb(7));
    }
}
