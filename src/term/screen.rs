//! Screen buffer
//!
//! A `rows x cols` cell grid with cursor, scroll region, saved-cursor slot
//! and a bounded scrollback ring. Every public operation restores the grid
//! invariants before returning: cursor in range (the column may transiently
//! equal `cols`, pending a wrap), scroll region in range, and no orphaned
//! continuation cell anywhere.
//!
//! The backing store is a single flat `Vec<Cell>` indexed `row * cols + col`;
//! `resize` is the only place raw indices are recomputed wholesale.

use std::collections::VecDeque;

use unicode_width::UnicodeWidthChar;

use super::cell::{Attr, Cell};

/// Tab stops every 8 columns.
const TAB_WIDTH: usize = 8;

/// Live grid plus scrollback.
pub struct ScreenBuffer {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor_row: usize,
    /// May equal `cols` after writing in the last column (deferred wrap).
    cursor_col: usize,
    scroll_top: usize,
    /// Inclusive.
    scroll_bottom: usize,
    saved_cursor: Option<(usize, usize)>,
    cursor_visible: bool,
    /// Attribute applied to subsequently written characters.
    pen: Attr,
    scrollback: VecDeque<Vec<Cell>>,
    scrollback_limit: usize,
    /// 0 = live view; >0 = scrolled back this many lines.
    view_offset: usize,
}

/// Owned copy of the displayed viewport for a renderer to iterate without
/// holding any reference into the live grid.
#[derive(Clone)]
pub struct Snapshot {
    pub rows: usize,
    pub cols: usize,
    /// Row-major, `rows * cols` cells, already shifted by the view offset.
    pub cells: Vec<Cell>,
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub cursor_visible: bool,
    pub view_offset: usize,
    pub scrollback_len: usize,
}

impl Snapshot {
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[row * self.cols + col]
    }
}

impl ScreenBuffer {
    pub fn new(rows: usize, cols: usize, scrollback_limit: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            cursor_row: 0,
            cursor_col: 0,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            saved_cursor: None,
            cursor_visible: true,
            pen: Attr::default(),
            scrollback: VecDeque::new(),
            scrollback_limit,
            view_offset: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    pub fn pen(&self) -> &Attr {
        &self.pen
    }

    pub fn pen_mut(&mut self) -> &mut Attr {
        &mut self.pen
    }

    #[inline]
    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[self.idx(row, col)]
    }

    pub fn row_slice(&self, row: usize) -> &[Cell] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    /// Visible characters of a row, trailing blanks trimmed. Continuation
    /// cells are skipped so a wide glyph appears once.
    pub fn row_text(&self, row: usize) -> String {
        let mut out = String::new();
        for cell in self.row_slice(row) {
            if !cell.is_continuation() {
                out.push(cell.ch);
            }
        }
        out.trim_end().to_string()
    }

    /// Cursor column clamped into the grid, for row-local edits while a
    /// wrap is pending.
    #[inline]
    fn col_in_grid(&self) -> usize {
        self.cursor_col.min(self.cols - 1)
    }

    /// Blank `[start, end)` of a row with the default attribute, widening
    /// the span so no half of a wide pair survives on either edge.
    fn blank_span(&mut self, row: usize, start: usize, end: usize) {
        let end = end.min(self.cols);
        if start >= end {
            return;
        }
        if start > 0 && self.cells[self.idx(row, start)].is_continuation() {
            let i = self.idx(row, start - 1);
            self.cells[i] = Cell::default();
        }
        if end < self.cols && self.cells[self.idx(row, end)].is_continuation() {
            let i = self.idx(row, end);
            self.cells[i] = Cell::default();
        }
        for col in start..end {
            let i = self.idx(row, col);
            self.cells[i] = Cell::default();
        }
    }

    fn blank_row(&mut self, row: usize) {
        self.blank_span(row, 0, self.cols);
    }

    /// Blank whichever other half pairs with the cell about to be
    /// overwritten at (row, col), so no orphan continuation remains.
    fn unpair(&mut self, row: usize, col: usize) {
        let i = self.idx(row, col);
        if self.cells[i].is_continuation() && col > 0 {
            let left = self.idx(row, col - 1);
            self.cells[left] = Cell::default();
        }
        if self.cells[i].is_wide_lead() && col + 1 < self.cols {
            let right = self.idx(row, col + 1);
            self.cells[right] = Cell::default();
        }
    }

    /// Write one printable character at the cursor, handling deferred
    /// wrap and double-width placement, then advance the cursor.
    pub fn write_char(&mut self, ch: char) {
        let width = match ch.width() {
            Some(w) if w > 0 => w,
            // Zero-width (combining) input has no cell of its own.
            _ => return,
        };

        if width == 2 && self.cols < 2 {
            return;
        }

        if self.cursor_col >= self.cols {
            self.cursor_col = 0;
            self.line_feed();
        }

        // A wide glyph cannot start in the last column: blank it and wrap.
        if width == 2 && self.cursor_col == self.cols - 1 {
            let row = self.cursor_row;
            let col = self.cursor_col;
            self.unpair(row, col);
            let i = self.idx(row, col);
            self.cells[i] = Cell::default();
            self.cursor_col = 0;
            self.line_feed();
        }

        let row = self.cursor_row;
        let col = self.cursor_col;
        self.unpair(row, col);
        if width == 2 {
            self.unpair(row, col + 1);
        }

        let i = self.idx(row, col);
        self.cells[i] = Cell {
            ch,
            attr: self.pen,
        };
        if width == 2 {
            let i = self.idx(row, col + 1);
            self.cells[i] = Cell::continuation(self.pen);
        }

        self.cursor_col += width;
    }

    pub fn carriage_return(&mut self) {
        self.cursor_col = 0;
    }

    /// Cursor down one line; scrolls the region when sitting on its
    /// bottom row.
    pub fn line_feed(&mut self) {
        if self.cursor_row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor_row + 1 < self.rows {
            self.cursor_row += 1;
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        }
    }

    pub fn tab(&mut self) {
        let next = (self.cursor_col / TAB_WIDTH + 1) * TAB_WIDTH;
        self.cursor_col = next.min(self.cols - 1);
    }

    /// Shift the scroll region up `n` rows, archiving evicted top rows to
    /// scrollback when the region starts at the top of the grid.
    pub fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        for _ in 0..n {
            if top == 0 {
                let evicted = self.row_slice(top).to_vec();
                self.push_scrollback(evicted);
            }
            if bottom > top {
                let src = self.idx(top + 1, 0)..self.idx(bottom + 1, 0);
                let dst = self.idx(top, 0);
                self.cells.copy_within(src, dst);
            }
            self.blank_row(bottom);
        }
    }

    /// Shift the scroll region down `n` rows; rows leaving the bottom are
    /// discarded.
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        for _ in 0..n {
            if bottom > top {
                let src = self.idx(top, 0)..self.idx(bottom, 0);
                let dst = self.idx(top + 1, 0);
                self.cells.copy_within(src, dst);
            }
            self.blank_row(top);
        }
    }

    fn push_scrollback(&mut self, row: Vec<Cell>) {
        if self.scrollback_limit == 0 {
            return;
        }
        if self.scrollback.len() == self.scrollback_limit {
            self.scrollback.pop_front();
        }
        self.scrollback.push_back(row);
    }

    pub fn cursor_up(&mut self, n: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.cursor_row = (self.cursor_row + n).min(self.rows - 1);
    }

    pub fn cursor_forward(&mut self, n: usize) {
        self.cursor_col = (self.col_in_grid() + n).min(self.cols - 1);
    }

    pub fn cursor_back(&mut self, n: usize) {
        self.cursor_col = self.col_in_grid().saturating_sub(n);
    }

    /// Absolute move from 1-indexed parameters, clamped into the grid.
    pub fn cursor_position(&mut self, row: usize, col: usize) {
        self.cursor_row = row.saturating_sub(1).min(self.rows - 1);
        self.cursor_col = col.saturating_sub(1).min(self.cols - 1);
    }

    /// Absolute column from a 1-indexed parameter.
    pub fn cursor_column(&mut self, col: usize) {
        self.cursor_col = col.saturating_sub(1).min(self.cols - 1);
    }

    /// Absolute row from a 1-indexed parameter.
    pub fn cursor_row_absolute(&mut self, row: usize) {
        self.cursor_row = row.saturating_sub(1).min(self.rows - 1);
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some((self.cursor_row, self.col_in_grid()));
    }

    pub fn restore_cursor(&mut self) {
        if let Some((row, col)) = self.saved_cursor {
            self.cursor_row = row.min(self.rows - 1);
            self.cursor_col = col.min(self.cols - 1);
        }
    }

    /// Cursor up one line; scrolls the region down when sitting on its
    /// top row.
    pub fn reverse_index(&mut self) {
        if self.cursor_row == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    /// Erase in display. Mode 0: cursor to end; 1: start to cursor;
    /// 2: whole grid; 3: whole grid plus scrollback.
    pub fn erase_display(&mut self, mode: usize) {
        match mode {
            0 => {
                self.erase_line(0);
                for row in self.cursor_row + 1..self.rows {
                    self.blank_row(row);
                }
            }
            1 => {
                for row in 0..self.cursor_row {
                    self.blank_row(row);
                }
                self.erase_line(1);
            }
            2 | 3 => {
                for row in 0..self.rows {
                    self.blank_row(row);
                }
                if mode == 3 {
                    self.scrollback.clear();
                    self.view_offset = 0;
                }
            }
            _ => {}
        }
    }

    /// Erase in line. Mode 0: cursor to end; 1: start through cursor;
    /// 2: whole line.
    pub fn erase_line(&mut self, mode: usize) {
        let row = self.cursor_row;
        let col = self.col_in_grid();
        match mode {
            0 => self.blank_span(row, col, self.cols),
            1 => self.blank_span(row, 0, col + 1),
            2 => self.blank_row(row),
            _ => {}
        }
    }

    /// Blank `n` cells from the cursor forward, not moving the cursor.
    pub fn erase_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let col = self.col_in_grid();
        self.blank_span(row, col, col + n.max(1));
    }

    /// Insert `n` blank lines at the cursor row. Effective only inside
    /// the scroll region; rows outside the region are never touched.
    pub fn insert_lines(&mut self, n: usize) {
        let row = self.cursor_row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        for _ in 0..n.min(bottom - row + 1) {
            if bottom > row {
                let src = self.idx(row, 0)..self.idx(bottom, 0);
                let dst = self.idx(row + 1, 0);
                self.cells.copy_within(src, dst);
            }
            self.blank_row(row);
        }
    }

    /// Delete `n` lines at the cursor row, shifting the rest of the
    /// scroll region up. Effective only inside the scroll region.
    pub fn delete_lines(&mut self, n: usize) {
        let row = self.cursor_row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        let bottom = self.scroll_bottom;
        for _ in 0..n.min(bottom - row + 1) {
            if bottom > row {
                let src = self.idx(row + 1, 0)..self.idx(bottom + 1, 0);
                let dst = self.idx(row, 0);
                self.cells.copy_within(src, dst);
            }
            self.blank_row(bottom);
        }
    }

    /// Insert `n` blank cells at the cursor, shifting the rest of the row
    /// right; cells pushed past the edge are lost.
    pub fn insert_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let col = self.col_in_grid();
        let n = n.max(1).min(self.cols - col);
        if col + n < self.cols {
            let src = self.idx(row, col)..self.idx(row, self.cols - n);
            let dst = self.idx(row, col + n);
            self.cells.copy_within(src, dst);
        }
        self.blank_span(row, col, col + n);
        // A pair split at the right edge leaves a dangling lead.
        let last = self.idx(row, self.cols - 1);
        if self.cells[last].is_wide_lead() {
            self.cells[last] = Cell::default();
        }
    }

    /// Delete `n` cells at the cursor, shifting the rest of the row left
    /// and blanking the vacated tail.
    pub fn delete_chars(&mut self, n: usize) {
        let row = self.cursor_row;
        let col = self.col_in_grid();
        let n = n.max(1).min(self.cols - col);
        // Deleting one half of a wide pair mispairs the survivor.
        self.unpair(row, col);
        if col + n < self.cols {
            let src = self.idx(row, col + n)..self.idx(row, self.cols);
            let dst = self.idx(row, col);
            self.cells.copy_within(src, dst);
        }
        self.blank_span(row, self.cols - n, self.cols);
        // The shift may land a continuation at the cursor with its lead gone.
        let at = self.idx(row, col);
        if self.cells[at].is_continuation() {
            self.cells[at] = Cell::default();
        }
    }

    /// Set the scroll region from 1-indexed parameters and home the
    /// cursor. Invalid regions are ignored; the home still happens.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = top.saturating_sub(1).min(self.rows - 1);
        let bottom = bottom.saturating_sub(1).min(self.rows - 1);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
        self.cursor_position(1, 1);
    }

    /// Full reset: blank grid, home cursor, default pen, full scroll
    /// region. Scrollback is kept.
    pub fn reset(&mut self) {
        self.cells = vec![Cell::default(); self.rows * self.cols];
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.saved_cursor = None;
        self.cursor_visible = true;
        self.pen = Attr::default();
        self.view_offset = 0;
    }

    /// Reallocate the grid, copying the overlapping top-left rectangle.
    /// Content outside the overlap is discarded; wrapped logical lines
    /// are not reflowed.
    pub fn resize(&mut self, new_rows: usize, new_cols: usize) {
        let new_rows = new_rows.max(1);
        let new_cols = new_cols.max(1);
        if new_rows == self.rows && new_cols == self.cols {
            return;
        }

        let mut next = vec![Cell::default(); new_rows * new_cols];
        for row in 0..self.rows.min(new_rows) {
            for col in 0..self.cols.min(new_cols) {
                next[row * new_cols + col] = self.cells[self.idx(row, col)];
            }
            // A wide pair cut at the new right edge loses its lead too.
            let last = row * new_cols + (new_cols - 1);
            if next[last].is_wide_lead() {
                next[last] = Cell::default();
            }
        }

        self.cells = next;
        self.rows = new_rows;
        self.cols = new_cols;
        self.cursor_row = self.cursor_row.min(new_rows - 1);
        self.cursor_col = self.cursor_col.min(new_cols - 1);
        self.scroll_top = 0;
        self.scroll_bottom = new_rows - 1;

        for line in &mut self.scrollback {
            line.resize(new_cols, Cell::default());
            if line[new_cols - 1].is_wide_lead() {
                line[new_cols - 1] = Cell::default();
            }
        }
        self.view_offset = self.view_offset.min(self.scrollback.len());
    }

    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    pub fn scrollback_line(&self, index: usize) -> Option<&[Cell]> {
        self.scrollback.get(index).map(|line| line.as_slice())
    }

    pub fn view_offset(&self) -> usize {
        self.view_offset
    }

    pub fn scroll_view_up(&mut self, n: usize) {
        self.view_offset = (self.view_offset + n).min(self.scrollback.len());
    }

    pub fn scroll_view_down(&mut self, n: usize) {
        self.view_offset = self.view_offset.saturating_sub(n);
    }

    pub fn scroll_view_to_live(&mut self) {
        self.view_offset = 0;
    }

    /// The row shown at viewport position `view_row`, accounting for the
    /// view offset into scrollback.
    pub fn display_line(&self, view_row: usize) -> &[Cell] {
        if self.view_offset == 0 {
            return self.row_slice(view_row);
        }
        let first = self.scrollback.len() - self.view_offset;
        let abs = first + view_row;
        if abs < self.scrollback.len() {
            &self.scrollback[abs]
        } else {
            self.row_slice(abs - self.scrollback.len())
        }
    }

    /// Coherent copy of the displayed viewport for rendering.
    pub fn snapshot(&self) -> Snapshot {
        let mut cells = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            let line = self.display_line(row);
            cells.extend_from_slice(line);
            // Scrollback lines from before a widening resize may be short.
            for _ in line.len()..self.cols {
                cells.push(Cell::default());
            }
        }
        Snapshot {
            rows: self.rows,
            cols: self.cols,
            cells,
            cursor_row: self.cursor_row,
            cursor_col: self.cursor_col.min(self.cols - 1),
            cursor_visible: self.cursor_visible,
            view_offset: self.view_offset,
            scrollback_len: self.scrollback.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_str(screen: &mut ScreenBuffer, s: &str) {
        for ch in s.chars() {
            screen.write_char(ch);
        }
    }

    #[test]
    fn deferred_wrap_at_last_column() {
        let mut screen = ScreenBuffer::new(4, 4, 0);
        write_str(&mut screen, "abcd");
        // Cursor parks past the edge until the next printable arrives.
        assert_eq!(screen.cursor(), (0, 4));
        screen.write_char('e');
        assert_eq!(screen.cursor(), (1, 1));
        assert_eq!(screen.row_text(0), "abcd");
        assert_eq!(screen.row_text(1), "e");
    }

    #[test]
    fn wide_char_wraps_and_pairs() {
        let mut screen = ScreenBuffer::new(4, 4, 0);
        write_str(&mut screen, "abc");
        screen.write_char('中');
        // The skipped last cell of row 0 is blanked.
        assert_eq!(screen.cell(0, 3).ch, ' ');
        assert_eq!(screen.cell(1, 0).ch, '中');
        assert!(screen.cell(1, 1).is_continuation());
        assert_eq!(screen.cursor(), (1, 2));
    }

    #[test]
    fn overwriting_wide_half_blanks_the_other() {
        let mut screen = ScreenBuffer::new(2, 6, 0);
        screen.write_char('中');
        // Overwrite the continuation half.
        screen.cursor_position(1, 2);
        screen.write_char('x');
        assert_eq!(screen.cell(0, 0).ch, ' ');
        assert_eq!(screen.cell(0, 1).ch, 'x');

        // Overwrite the lead half.
        screen.cursor_position(1, 3);
        screen.write_char('国');
        screen.cursor_position(1, 3);
        screen.write_char('y');
        assert_eq!(screen.cell(0, 2).ch, 'y');
        assert!(!screen.cell(0, 3).is_continuation());
    }

    #[test]
    fn linefeed_scrolls_region_and_archives() {
        let mut screen = ScreenBuffer::new(3, 4, 10);
        write_str(&mut screen, "top");
        screen.cursor_position(3, 1);
        screen.line_feed();
        assert_eq!(screen.scrollback_len(), 1);
        assert_eq!(screen.row_text(0), "");
        let archived: String = screen
            .scrollback_line(0)
            .unwrap()
            .iter()
            .map(|c| c.ch)
            .collect();
        assert_eq!(archived.trim_end(), "top");
    }

    #[test]
    fn insert_lines_confined_to_scroll_region() {
        let mut screen = ScreenBuffer::new(10, 10, 0);
        for row in 0..10 {
            screen.cursor_position(row + 1, 1);
            write_str(&mut screen, &format!("row{row}"));
        }
        screen.set_scroll_region(3, 6); // rows 2..=5
        screen.cursor_position(4, 1); // row 3
        screen.insert_lines(1);

        assert_eq!(screen.row_text(0), "row0");
        assert_eq!(screen.row_text(1), "row1");
        assert_eq!(screen.row_text(2), "row2");
        assert_eq!(screen.row_text(3), "");
        assert_eq!(screen.row_text(4), "row3");
        assert_eq!(screen.row_text(5), "row4");
        // row5 was pushed out of the region and discarded.
        for row in 6..10 {
            assert_eq!(screen.row_text(row), format!("row{row}"));
        }
    }

    #[test]
    fn delete_lines_confined_to_scroll_region() {
        let mut screen = ScreenBuffer::new(6, 8, 0);
        for row in 0..6 {
            screen.cursor_position(row + 1, 1);
            write_str(&mut screen, &format!("r{row}"));
        }
        screen.set_scroll_region(2, 5); // rows 1..=4
        screen.cursor_position(2, 1);
        screen.delete_lines(1);
        assert_eq!(screen.row_text(0), "r0");
        assert_eq!(screen.row_text(1), "r2");
        assert_eq!(screen.row_text(2), "r3");
        assert_eq!(screen.row_text(3), "r4");
        assert_eq!(screen.row_text(4), "");
        assert_eq!(screen.row_text(5), "r5");
    }

    #[test]
    fn outside_scroll_region_line_ops_are_noops() {
        let mut screen = ScreenBuffer::new(6, 8, 0);
        write_str(&mut screen, "keep");
        screen.set_scroll_region(3, 5);
        screen.cursor_position(1, 1);
        screen.insert_lines(2);
        screen.delete_lines(2);
        assert_eq!(screen.row_text(0), "keep");
    }

    #[test]
    fn scrollback_capped_oldest_first() {
        let limit = 5;
        let mut screen = ScreenBuffer::new(3, 8, limit);
        for i in 0..limit + 10 {
            screen.cursor_position(1, 1);
            screen.erase_line(2);
            write_str(&mut screen, &format!("line{i}"));
            screen.scroll_up(1);
        }
        assert_eq!(screen.scrollback_len(), limit);
        for (slot, i) in (10..limit + 10).enumerate() {
            let text: String = screen
                .scrollback_line(slot)
                .unwrap()
                .iter()
                .map(|c| c.ch)
                .collect();
            assert_eq!(text.trim_end(), format!("line{i}"));
        }
    }

    #[test]
    fn insert_delete_chars_shift_within_row() {
        let mut screen = ScreenBuffer::new(2, 8, 0);
        write_str(&mut screen, "abcdef");
        screen.cursor_position(1, 2);
        screen.insert_chars(2);
        assert_eq!(screen.row_text(0), "a  bcdef");
        screen.delete_chars(2);
        assert_eq!(screen.row_text(0), "abcdef");
    }

    #[test]
    fn delete_chars_repairs_wide_pair() {
        let mut screen = ScreenBuffer::new(2, 8, 0);
        write_str(&mut screen, "a中b");
        screen.cursor_position(1, 1);
        // Deleting 'a' and the wide lead leaves the continuation orphaned
        // at the cursor; it must be blanked.
        screen.delete_chars(2);
        assert!(!screen.cell(0, 0).is_continuation());
        for col in 0..8 {
            assert!(
                !screen.cell(0, col).is_continuation()
                    || screen.cell(0, col.saturating_sub(1)).is_wide_lead()
            );
        }
    }

    #[test]
    fn delete_chars_on_continuation_blanks_the_lead() {
        let mut screen = ScreenBuffer::new(2, 8, 0);
        write_str(&mut screen, "中x");
        // Cursor on the continuation half; the surviving lead must not
        // keep claiming a second column.
        screen.cursor_position(1, 2);
        screen.delete_chars(1);
        assert!(!screen.cell(0, 0).is_wide_lead());
        assert_eq!(screen.cell(0, 0).ch, ' ');
        assert_eq!(screen.cell(0, 1).ch, 'x');
    }

    #[test]
    fn erase_display_modes() {
        let mut screen = ScreenBuffer::new(3, 4, 10);
        for row in 0..3 {
            screen.cursor_position(row + 1, 1);
            write_str(&mut screen, "xxxx");
        }
        screen.scroll_up(1);
        assert_eq!(screen.scrollback_len(), 1);

        screen.cursor_position(2, 3);
        screen.erase_display(0);
        assert_eq!(screen.row_text(1), "xx");
        assert_eq!(screen.row_text(2), "");

        screen.erase_display(3);
        assert_eq!(screen.row_text(0), "");
        assert_eq!(screen.scrollback_len(), 0);
    }

    #[test]
    fn resize_preserves_overlap_and_discards_rest() {
        let mut screen = ScreenBuffer::new(24, 80, 0);
        write_str(&mut screen, "hello world");
        screen.resize(10, 40);
        assert_eq!(screen.row_text(0), "hello world");
        screen.resize(24, 80);
        // Nothing resurrected beyond the overlap.
        assert_eq!(screen.row_text(0), "hello world");
        assert_eq!(screen.scroll_region(), (0, 23));
        for row in 10..24 {
            assert_eq!(screen.row_text(row), "");
        }
    }

    #[test]
    fn resize_clamps_cursor_and_view_offset() {
        let mut screen = ScreenBuffer::new(10, 40, 100);
        screen.cursor_position(10, 40);
        for _ in 0..20 {
            screen.scroll_up(1);
        }
        screen.scroll_view_up(15);
        screen.resize(4, 10);
        let (row, col) = screen.cursor();
        assert!(row < 4 && col < 10);
        assert!(screen.view_offset() <= screen.scrollback_len());
    }

    #[test]
    fn view_offset_reads_scrollback() {
        let mut screen = ScreenBuffer::new(2, 8, 10);
        write_str(&mut screen, "old");
        screen.scroll_up(1);
        screen.cursor_position(1, 1);
        write_str(&mut screen, "new");
        screen.scroll_view_up(1);
        let snap = screen.snapshot();
        let top: String = (0..snap.cols).map(|c| snap.cell(0, c).ch).collect();
        assert_eq!(top.trim_end(), "old");
        screen.scroll_view_to_live();
        assert_eq!(screen.view_offset(), 0);
    }
}
