//! Resize coordination
//!
//! Turns viewport pixel metrics supplied by the hosting renderer into
//! grid dimensions. The session applies the result to the screen buffer
//! and the pseudo console only when the dimensions actually changed.

use crate::pty::PtySize;

/// Pixel metrics of the hosting viewport and of one character cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportMetrics {
    pub width_px: u32,
    pub height_px: u32,
    pub cell_width_px: u32,
    pub cell_height_px: u32,
}

impl ViewportMetrics {
    /// Grid dimensions that fit the viewport: floor division, at least
    /// one row and one column.
    pub fn grid_size(&self) -> PtySize {
        let cols = if self.cell_width_px == 0 {
            1
        } else {
            (self.width_px / self.cell_width_px).max(1)
        };
        let rows = if self.cell_height_px == 0 {
            1
        } else {
            (self.height_px / self.cell_height_px).max(1)
        };
        PtySize::new(cols.min(u16::MAX as u32) as u16, rows.min(u16::MAX as u32) as u16)
    }
}
