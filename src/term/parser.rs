//! VT escape-sequence parser
//!
//! A character-level state machine classifying input into plain text,
//! single-character escapes, CSI and OSC sequences, and dispatching each
//! recognized command against a [`ScreenBuffer`].
//!
//! The parser is fragmentation-safe: feeding a stream one character at a
//! time produces exactly the same mutations as feeding it whole, because
//! all intermediate state lives in the parser between calls. Malformed or
//! unsupported sequences are discarded, never fatal.

use tracing::debug;

use super::cell::{degrade_256, degrade_rgb, AttrFlags};
use super::screen::ScreenBuffer;

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    Csi,
    Osc,
    /// ESC seen inside an OSC payload, awaiting the terminator byte.
    OscEscape,
}

/// Escape-sequence state machine.
#[derive(Default)]
pub struct Parser {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    /// Set by a `?` prefix (DEC private sequences).
    private: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            current_param: None,
            private: false,
        }
    }

    /// Feed a decoded string; equivalent to feeding every char in order.
    pub fn feed_str(&mut self, input: &str, screen: &mut ScreenBuffer) {
        for ch in input.chars() {
            self.feed(ch, screen);
        }
    }

    /// Feed a single character, applying zero or more screen mutations.
    pub fn feed(&mut self, ch: char, screen: &mut ScreenBuffer) {
        match self.state {
            ParserState::Ground => self.ground(ch, screen),
            ParserState::Escape => self.escape(ch, screen),
            ParserState::Csi => self.csi(ch, screen),
            ParserState::Osc => self.osc(ch),
            ParserState::OscEscape => self.osc_escape(ch, screen),
        }
    }

    fn ground(&mut self, ch: char, screen: &mut ScreenBuffer) {
        match ch {
            '\x1b' => self.enter_escape(),
            '\r' => screen.carriage_return(),
            '\n' | '\x0b' | '\x0c' => screen.line_feed(),
            '\x08' => screen.backspace(),
            '\t' => screen.tab(),
            '\x07' => {} // BEL
            c if (c as u32) < 0x20 || c == '\x7f' => {}
            c => screen.write_char(c),
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.current_param = None;
        self.private = false;
    }

    fn escape(&mut self, ch: char, screen: &mut ScreenBuffer) {
        self.state = ParserState::Ground;
        match ch {
            '[' => self.state = ParserState::Csi,
            ']' => self.state = ParserState::Osc,
            '7' => screen.save_cursor(),
            '8' => screen.restore_cursor(),
            'D' => screen.line_feed(),
            'E' => {
                screen.carriage_return();
                screen.line_feed();
            }
            'M' => screen.reverse_index(),
            'c' => screen.reset(),
            other => {
                debug!(ch = %other.escape_debug(), "ignoring escape sequence");
            }
        }
    }

    fn csi(&mut self, ch: char, screen: &mut ScreenBuffer) {
        match ch {
            '0'..='9' => {
                let digit = ch as u16 - '0' as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            ';' | ':' => {
                self.params.push(self.current_param.take().unwrap_or(0));
            }
            '?' => self.private = true,
            final_byte => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.dispatch_csi(final_byte, screen);
                self.state = ParserState::Ground;
            }
        }
    }

    fn osc(&mut self, ch: char) {
        // OSC payloads (window title etc.) are skipped, not interpreted.
        match ch {
            '\x07' => self.state = ParserState::Ground,
            '\x1b' => self.state = ParserState::OscEscape,
            _ => {}
        }
    }

    fn osc_escape(&mut self, ch: char, screen: &mut ScreenBuffer) {
        if ch == '\\' {
            // ST: ESC \ terminates the OSC.
            self.state = ParserState::Ground;
        } else {
            // Unterminated OSC; treat the ESC as the start of a new
            // sequence and reprocess this character.
            self.enter_escape();
            self.escape(ch, screen);
        }
    }

    /// Parameter at `index`, with empty / zero treated as `default`.
    fn param(&self, index: usize, default: usize) -> usize {
        match self.params.get(index).copied() {
            Some(0) | None => default,
            Some(v) => v as usize,
        }
    }

    /// Parameter at `index` where zero is meaningful (erase modes).
    fn param_raw(&self, index: usize) -> usize {
        self.params.get(index).copied().unwrap_or(0) as usize
    }

    fn dispatch_csi(&mut self, final_byte: char, screen: &mut ScreenBuffer) {
        if self.private {
            match (final_byte, self.param_raw(0)) {
                ('h', 25) => screen.set_cursor_visible(true),
                ('l', 25) => screen.set_cursor_visible(false),
                _ => {
                    debug!(
                        params = ?self.params,
                        final_byte = %final_byte,
                        "ignoring private CSI sequence"
                    );
                }
            }
            return;
        }

        match final_byte {
            'A' => screen.cursor_up(self.param(0, 1)),
            'B' => screen.cursor_down(self.param(0, 1)),
            'C' => screen.cursor_forward(self.param(0, 1)),
            'D' => screen.cursor_back(self.param(0, 1)),
            'E' => {
                screen.cursor_down(self.param(0, 1));
                screen.carriage_return();
            }
            'F' => {
                screen.cursor_up(self.param(0, 1));
                screen.carriage_return();
            }
            'G' => screen.cursor_column(self.param(0, 1)),
            'H' | 'f' => screen.cursor_position(self.param(0, 1), self.param(1, 1)),
            'J' => screen.erase_display(self.param_raw(0)),
            'K' => screen.erase_line(self.param_raw(0)),
            'L' => screen.insert_lines(self.param(0, 1)),
            'M' => screen.delete_lines(self.param(0, 1)),
            'P' => screen.delete_chars(self.param(0, 1)),
            '@' => screen.insert_chars(self.param(0, 1)),
            'S' => screen.scroll_up(self.param(0, 1)),
            'T' => screen.scroll_down(self.param(0, 1)),
            'X' => screen.erase_chars(self.param(0, 1)),
            'd' => screen.cursor_row_absolute(self.param(0, 1)),
            'r' => {
                let top = self.param(0, 1);
                let bottom = self.param(1, screen.rows());
                screen.set_scroll_region(top, bottom);
            }
            's' => screen.save_cursor(),
            'u' => screen.restore_cursor(),
            'm' => self.apply_sgr(screen),
            other => {
                debug!(
                    params = ?self.params,
                    final_byte = %other.escape_debug(),
                    "ignoring CSI sequence"
                );
            }
        }
    }

    /// Select Graphic Rendition. Parameters apply left to right; later
    /// parameters override earlier ones for the same field.
    fn apply_sgr(&self, screen: &mut ScreenBuffer) {
        if self.params.is_empty() {
            screen.pen_mut().reset();
            return;
        }

        let mut iter = self.params.iter().copied();
        while let Some(param) = iter.next() {
            let pen = screen.pen_mut();
            match param {
                0 => pen.reset(),
                1 => pen.flags |= AttrFlags::BOLD,
                4 => pen.flags |= AttrFlags::UNDERLINE,
                7 => pen.flags |= AttrFlags::REVERSE,
                22 => pen.flags &= !AttrFlags::BOLD,
                24 => pen.flags &= !AttrFlags::UNDERLINE,
                27 => pen.flags &= !AttrFlags::REVERSE,
                30..=37 => pen.fg = (param - 30) as u8,
                38 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        screen.pen_mut().fg = color;
                    }
                }
                39 => pen.fg = crate::term::cell::DEFAULT_FG,
                40..=47 => pen.bg = (param - 40) as u8,
                48 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        screen.pen_mut().bg = color;
                    }
                }
                49 => pen.bg = crate::term::cell::DEFAULT_BG,
                90..=97 => pen.fg = (param - 90 + 8) as u8,
                100..=107 => pen.bg = (param - 100 + 8) as u8,
                other => {
                    debug!(param = other, "ignoring SGR parameter");
                }
            }
        }
    }

    /// Consume a `38;5;N` / `38;2;R;G;B` tail, degrading the result to
    /// the 16-entry palette.
    fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<u8> {
        match iter.next() {
            Some(5) => iter.next().map(|n| degrade_256(n.min(255) as u8)),
            Some(2) => {
                let r = iter.next()?.min(255) as u8;
                let g = iter.next()?.min(255) as u8;
                let b = iter.next()?.min(255) as u8;
                Some(degrade_rgb(r, g, b))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::cell::DEFAULT_FG;

    fn feed(parser: &mut Parser, screen: &mut ScreenBuffer, input: &str) {
        parser.feed_str(input, screen);
    }

    #[test]
    fn fragmentation_invariance() {
        let input = "\x1b[31mHi\x1b[0m\x1b]0;title\x07\x1b[2;2H中";

        let mut whole = ScreenBuffer::new(24, 80, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut whole, input);

        let mut split = ScreenBuffer::new(24, 80, 0);
        let mut parser = Parser::new();
        for ch in input.chars() {
            parser.feed(ch, &mut split);
        }

        assert_eq!(whole.cursor(), split.cursor());
        for row in 0..24 {
            assert_eq!(whole.row_slice(row), split.row_slice(row));
        }
    }

    #[test]
    fn sgr_bold_red_round_trip() {
        let mut screen = ScreenBuffer::new(24, 80, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[1;31mX\x1b[0mY");

        let x = screen.cell(0, 0);
        assert!(x.attr.bold());
        assert_eq!(x.attr.effective_fg(), 9);

        let y = screen.cell(0, 1);
        assert!(!y.attr.bold());
        assert_eq!(y.attr.effective_fg(), DEFAULT_FG);
    }

    #[test]
    fn sgr_later_params_override() {
        let mut screen = ScreenBuffer::new(4, 4, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[31;32;4;24mZ");
        let z = screen.cell(0, 0);
        assert_eq!(z.attr.fg, 2);
        assert!(!z.attr.underline());
    }

    #[test]
    fn sgr_256_and_rgb_degrade() {
        let mut screen = ScreenBuffer::new(4, 8, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[38;5;9ma");
        assert_eq!(screen.cell(0, 0).attr.fg, 9);
        feed(&mut parser, &mut screen, "\x1b[38;5;120mb");
        assert_eq!(screen.cell(0, 1).attr.fg, DEFAULT_FG);
        feed(&mut parser, &mut screen, "\x1b[48;5;250mc");
        assert_eq!(screen.cell(0, 2).attr.bg, 15);
        feed(&mut parser, &mut screen, "\x1b[38;2;255;255;255md");
        assert_eq!(screen.cell(0, 3).attr.fg, 15);
    }

    #[test]
    fn cursor_position_clamped() {
        let mut screen = ScreenBuffer::new(24, 80, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[999;999H");
        assert_eq!(screen.cursor(), (23, 79));
    }

    #[test]
    fn cursor_movement_and_home() {
        let mut screen = ScreenBuffer::new(24, 80, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[5;10H");
        assert_eq!(screen.cursor(), (4, 9));
        feed(&mut parser, &mut screen, "\x1b[2A\x1b[3C\x1b[H");
        assert_eq!(screen.cursor(), (0, 0));
        feed(&mut parser, &mut screen, "\x1b[7G\x1b[4d");
        assert_eq!(screen.cursor(), (3, 6));
    }

    #[test]
    fn scroll_region_set_and_homed() {
        let mut screen = ScreenBuffer::new(10, 20, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[5;8H\x1b[3;6r");
        assert_eq!(screen.scroll_region(), (2, 5));
        assert_eq!(screen.cursor(), (0, 0));
        // Defaults restore the full grid.
        feed(&mut parser, &mut screen, "\x1b[r");
        assert_eq!(screen.scroll_region(), (0, 9));
    }

    #[test]
    fn save_restore_cursor() {
        let mut screen = ScreenBuffer::new(10, 20, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[4;6H\x1b[s\x1b[1;1H\x1b[u");
        assert_eq!(screen.cursor(), (3, 5));
        feed(&mut parser, &mut screen, "\x1b7\x1b[9;9H\x1b8");
        assert_eq!(screen.cursor(), (3, 5));
    }

    #[test]
    fn cursor_visibility_private_mode() {
        let mut screen = ScreenBuffer::new(4, 4, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[?25l");
        assert!(!screen.cursor_visible());
        feed(&mut parser, &mut screen, "\x1b[?25h");
        assert!(screen.cursor_visible());
    }

    #[test]
    fn osc_payload_is_skipped() {
        let mut screen = ScreenBuffer::new(4, 20, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b]0;a title\x07ok");
        assert_eq!(screen.row_text(0), "ok");
        feed(&mut parser, &mut screen, "\x1b]2;another\x1b\\!");
        assert_eq!(screen.row_text(0), "ok!");
    }

    #[test]
    fn unterminated_osc_aborts_into_next_escape() {
        let mut screen = ScreenBuffer::new(4, 20, 0);
        let mut parser = Parser::new();
        // ESC inside the OSC is not followed by `\`; the new sequence
        // must still take effect.
        feed(&mut parser, &mut screen, "\x1b]0;title\x1b[3Gx");
        assert_eq!(screen.cursor(), (0, 3));
        assert_eq!(screen.cell(0, 2).ch, 'x');
    }

    #[test]
    fn unknown_sequences_are_ignored() {
        let mut screen = ScreenBuffer::new(4, 10, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[99z\x1bQab");
        assert_eq!(screen.row_text(0), "ab");
    }

    #[test]
    fn erase_line_and_display_via_csi() {
        let mut screen = ScreenBuffer::new(3, 6, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "abcdef\r\nsecond");
        feed(&mut parser, &mut screen, "\x1b[1;4H\x1b[K");
        assert_eq!(screen.row_text(0), "abc");
        feed(&mut parser, &mut screen, "\x1b[2J");
        assert_eq!(screen.row_text(0), "");
        assert_eq!(screen.row_text(1), "");
    }

    #[test]
    fn erase_chars_forward() {
        let mut screen = ScreenBuffer::new(2, 8, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "abcdef\x1b[1;2H\x1b[3X");
        assert_eq!(screen.row_text(0), "a   ef");
    }

    #[test]
    fn reverse_index_scrolls_at_top() {
        let mut screen = ScreenBuffer::new(3, 6, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "top\x1b[1;1H\x1bM");
        assert_eq!(screen.row_text(0), "");
        assert_eq!(screen.row_text(1), "top");
    }

    #[test]
    fn full_reset_restores_defaults() {
        let mut screen = ScreenBuffer::new(4, 8, 0);
        let mut parser = Parser::new();
        feed(&mut parser, &mut screen, "\x1b[7m\x1b[2;5rtext\x1b[?25l\x1bc");
        assert_eq!(screen.cursor(), (0, 0));
        assert_eq!(screen.scroll_region(), (0, 3));
        assert!(screen.cursor_visible());
        assert_eq!(*screen.pen(), crate::term::cell::Attr::default());
        assert_eq!(screen.row_text(0), "");
    }
}
