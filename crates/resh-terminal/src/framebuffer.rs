//! Frame buffer implementation for terminal content
//!
//! Manages the 2D grid of cells that make up the terminal display

/// A single cell in the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The character in this cell
    pub c: char,

    /// Foreground color (ANSI 256-color palette or RGB)
    pub fg: Color,

    /// Background color
    pub bg: Color,

    /// Text attributes
    pub attrs: Attributes,

    /// Columns occupied: 1 normal, 2 wide leader, 0 continuation of the
    /// wide character to the left
    pub width: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            c: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attributes::default(),
            width: 1,
        }
    }
}

impl Cell {
    pub fn is_wide(&self) -> bool {
        self.width == 2
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// The pen this cell was drawn with
    pub fn renditions(&self) -> Renditions {
        Renditions {
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
        }
    }
}

/// Color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Default terminal color
    #[default]
    Default,

    /// ANSI 256-color palette index
    Indexed(u8),

    /// RGB color
    Rgb(u8, u8, u8),
}

/// Text attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub reverse: bool,
    pub hidden: bool,
    pub dim: bool,
    pub blink: bool,
}

/// Colors and attributes applied to newly written characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Renditions {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attributes,
}

/// Frame buffer containing terminal content
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Width of the terminal
    width: u16,

    /// Height of the terminal
    height: u16,

    /// Cells in row-major order
    cells: Vec<Cell>,

    /// Cursor X position (0-based)
    cursor_x: u16,

    /// Cursor Y position (0-based)
    cursor_y: u16,

    /// Set after printing into the last column; the next printable
    /// character wraps first
    wrap_pending: bool,

    /// Whether cursor is visible
    cursor_visible: bool,

    /// Pen for new characters
    pen: Renditions,
}

impl PartialEq for FrameBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.cursor_x == other.cursor_x
            && self.cursor_y == other.cursor_y
            && self.cursor_visible == other.cursor_visible
            && self.cells == other.cells
    }
}

impl FrameBuffer {
    /// Create a new frame buffer
    pub fn new(width: u16, height: u16) -> Self {
        let cells = vec![Cell::default(); (width as usize) * (height as usize)];

        Self {
            width,
            height,
            cells,
            cursor_x: 0,
            cursor_y: 0,
            wrap_pending: false,
            cursor_visible: true,
            pen: Renditions::default(),
        }
    }

    /// Get terminal width
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get terminal height
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get cursor position
    pub fn cursor_position(&self) -> (u16, u16) {
        (self.cursor_x, self.cursor_y)
    }

    /// Set cursor position, clamped to the screen
    pub fn set_cursor_position(&mut self, x: u16, y: u16) {
        self.cursor_x = x.min(self.width.saturating_sub(1));
        self.cursor_y = y.min(self.height.saturating_sub(1));
        self.wrap_pending = false;
    }

    /// Get cursor visibility
    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    /// Set cursor visibility
    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    pub fn wrap_pending(&self) -> bool {
        self.wrap_pending
    }

    fn index(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Get cell at position
    pub fn cell_at(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }

        self.cells.get(self.index(x, y))
    }

    /// Get mutable cell at position
    pub fn cell_at_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let index = self.index(x, y);
        self.cells.get_mut(index)
    }

    /// One row of cells
    pub fn row(&self, y: u16) -> &[Cell] {
        if y >= self.height {
            return &[];
        }
        let start = self.index(0, y);
        &self.cells[start..start + self.width as usize]
    }

    /// Text of one row with wide continuations skipped
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .iter()
            .filter(|cell| !cell.is_continuation())
            .map(|cell| cell.c)
            .collect()
    }

    /// Blank the other half of any wide character touching this cell
    fn detach_wide(&mut self, x: u16, y: u16) {
        let Some(cell) = self.cell_at(x, y).copied() else {
            return;
        };

        if cell.is_continuation() && x > 0 {
            if let Some(left) = self.cell_at_mut(x - 1, y) {
                *left = Cell::default();
            }
        } else if cell.is_wide() {
            if let Some(right) = self.cell_at_mut(x + 1, y) {
                *right = Cell::default();
            }
        }
    }

    /// Write a character of the given column width at the cursor
    pub fn write_char(&mut self, c: char, char_width: u8) {
        if self.width == 0 || self.height == 0 || char_width == 0 {
            return;
        }
        if char_width == 2 && self.width < 2 {
            return;
        }

        if self.wrap_pending
            || u32::from(self.cursor_x) + u32::from(char_width) > u32::from(self.width)
        {
            self.cursor_x = 0;
            self.line_feed();
        }
        self.wrap_pending = false;

        let (x, y) = (self.cursor_x, self.cursor_y);
        for dx in 0..u16::from(char_width) {
            self.detach_wide(x + dx, y);
        }

        let pen = self.pen;
        if let Some(cell) = self.cell_at_mut(x, y) {
            *cell = Cell {
                c,
                fg: pen.fg,
                bg: pen.bg,
                attrs: pen.attrs,
                width: char_width,
            };
        }
        if char_width == 2 {
            if let Some(cell) = self.cell_at_mut(x + 1, y) {
                *cell = Cell {
                    c: ' ',
                    fg: pen.fg,
                    bg: pen.bg,
                    attrs: pen.attrs,
                    width: 0,
                };
            }
        }

        // Advance cursor, deferring the wrap at the right margin
        match x.checked_add(u16::from(char_width)) {
            Some(next) if next < self.width => self.cursor_x = next,
            _ => {
                self.cursor_x = self.width - 1;
                self.wrap_pending = true;
            }
        }
    }

    /// Move cursor down one line, scrolling at the bottom
    pub fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.height == 0 {
            return;
        }
        if self.cursor_y + 1 >= self.height {
            self.scroll_up(1);
            self.cursor_y = self.height - 1;
        } else {
            self.cursor_y += 1;
        }
    }

    /// Move cursor up one line, scrolling at the top
    pub fn reverse_line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor_y == 0 {
            self.scroll_down(1);
        } else {
            self.cursor_y -= 1;
        }
    }

    /// Carriage return (move to start of line)
    pub fn carriage_return(&mut self) {
        self.cursor_x = 0;
        self.wrap_pending = false;
    }

    /// Blank a range of cells in one row, keeping wide pairs intact
    fn erase_cells(&mut self, y: u16, from_x: u16, to_x: u16) {
        let to_x = to_x.min(self.width);
        if from_x >= to_x {
            return;
        }
        self.detach_wide(from_x, y);
        self.detach_wide(to_x - 1, y);
        let start = self.index(from_x, y);
        let end = self.index(to_x - 1, y) + 1;
        self.cells[start..end].fill(Cell::default());
    }

    /// Clear the screen
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Clear from cursor to end of screen
    pub fn clear_to_end(&mut self) {
        self.clear_to_eol();
        let start = self.index(0, self.cursor_y.saturating_add(1).min(self.height));
        for cell in &mut self.cells[start..] {
            *cell = Cell::default();
        }
    }

    /// Clear from cursor to end of line
    pub fn clear_to_eol(&mut self) {
        self.erase_cells(self.cursor_y, self.cursor_x, self.width);
    }

    /// Clear from beginning of screen to cursor (inclusive)
    pub fn clear_to_cursor(&mut self) {
        self.clear_line_to_cursor();
        let end = self.index(0, self.cursor_y);
        for cell in &mut self.cells[..end] {
            *cell = Cell::default();
        }
    }

    /// Clear from beginning of line to cursor (inclusive)
    pub fn clear_line_to_cursor(&mut self) {
        self.erase_cells(self.cursor_y, 0, self.cursor_x + 1);
    }

    /// Clear entire line
    pub fn clear_line(&mut self) {
        self.erase_cells(self.cursor_y, 0, self.width);
    }

    /// Erase n characters starting at the cursor
    pub fn erase_chars(&mut self, n: u16) {
        let end = self.cursor_x.saturating_add(n);
        self.erase_cells(self.cursor_y, self.cursor_x, end);
    }

    /// Insert n blank cells at the cursor, shifting the rest right
    pub fn insert_chars(&mut self, n: u16) {
        self.shift_row(n, true);
    }

    /// Delete n cells at the cursor, shifting the rest left
    pub fn delete_chars(&mut self, n: u16) {
        self.shift_row(n, false);
    }

    fn shift_row(&mut self, n: u16, insert: bool) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (x, y) = (self.cursor_x, self.cursor_y);
        let n = n.min(self.width - x) as usize;
        self.detach_wide(x, y);
        self.detach_wide(self.width - 1, y);

        let start = self.index(x, y);
        let end = self.index(0, y) + self.width as usize;
        let span = &mut self.cells[start..end];
        if insert {
            span.rotate_right(n);
            span[..n].fill(Cell::default());
        } else {
            span.rotate_left(n);
            let len = span.len();
            span[len - n..].fill(Cell::default());
        }
        self.repair_row(y);
        self.wrap_pending = false;
    }

    /// Blank wide halves that lost their partner after a row shift
    fn repair_row(&mut self, y: u16) {
        let row_start = self.index(0, y);
        let width = self.width as usize;
        for x in 0..width {
            let i = row_start + x;
            let cell = self.cells[i];
            let orphan_cont = cell.is_continuation()
                && (x == 0 || !self.cells[i - 1].is_wide());
            let orphan_lead =
                cell.is_wide() && (x + 1 >= width || !self.cells[i + 1].is_continuation());
            if orphan_cont || orphan_lead {
                self.cells[i] = Cell::default();
            }
        }
    }

    /// Scroll screen up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        if n == 0 || self.height == 0 {
            return;
        }
        let n = n.min(self.height);

        // Shift cells up
        let shift = (n as usize) * (self.width as usize);
        self.cells.rotate_left(shift);

        // Clear new lines at bottom
        let clear_start = ((self.height - n) as usize) * (self.width as usize);
        for cell in &mut self.cells[clear_start..] {
            *cell = Cell::default();
        }
    }

    /// Scroll screen down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        if n == 0 || self.height == 0 {
            return;
        }
        let n = n.min(self.height);

        let shift = (n as usize) * (self.width as usize);
        self.cells.rotate_right(shift);
        for cell in &mut self.cells[..shift] {
            *cell = Cell::default();
        }
    }

    /// Current pen
    pub fn pen(&self) -> Renditions {
        self.pen
    }

    /// Get current text attributes
    pub fn current_attrs(&self) -> Attributes {
        self.pen.attrs
    }

    /// Set current text attributes
    pub fn set_attrs(&mut self, attrs: Attributes) {
        self.pen.attrs = attrs;
    }

    /// Set current foreground color
    pub fn set_fg_color(&mut self, color: Color) {
        self.pen.fg = color;
    }

    /// Set current background color
    pub fn set_bg_color(&mut self, color: Color) {
        self.pen.bg = color;
    }

    /// Reset text attributes and colors
    pub fn reset_attrs(&mut self) {
        self.pen = Renditions::default();
    }

    /// Resize the frame buffer
    pub fn resize(&mut self, new_width: u16, new_height: u16) {
        let old_width = self.width;
        let old_height = self.height;

        // Create new buffer
        let mut new_cells = vec![Cell::default(); (new_width as usize) * (new_height as usize)];

        // Copy existing content
        let copy_width = old_width.min(new_width) as usize;
        let copy_height = old_height.min(new_height) as usize;

        for y in 0..copy_height {
            let old_start = y * (old_width as usize);
            let new_start = y * (new_width as usize);

            new_cells[new_start..new_start + copy_width]
                .copy_from_slice(&self.cells[old_start..old_start + copy_width]);
        }

        self.cells = new_cells;
        self.width = new_width;
        self.height = new_height;

        // A wide character cut at the new right margin loses its pair
        for y in 0..new_height {
            self.repair_row(y);
        }

        // Adjust cursor position
        self.cursor_x = self.cursor_x.min(new_width.saturating_sub(1));
        self.cursor_y = self.cursor_y.min(new_height.saturating_sub(1));
        self.wrap_pending = false;
    }

    /// Get all cells
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_wrap_at_right_margin() {
        let mut fb = FrameBuffer::new(3, 2);
        for c in "abc".chars() {
            fb.write_char(c, 1);
        }
        assert_eq!(fb.cursor_position(), (2, 0));
        assert!(fb.wrap_pending());

        fb.write_char('d', 1);
        assert_eq!(fb.row_text(1), "d  ");
        assert_eq!(fb.cursor_position(), (1, 1));
    }

    #[test]
    fn test_bottom_right_write_does_not_scroll() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set_cursor_position(1, 1);
        fb.write_char('z', 1);
        assert_eq!(fb.row_text(1), " z");
        assert_eq!(fb.row_text(0), "  ");
    }

    #[test]
    fn test_wide_char_pairing() {
        let mut fb = FrameBuffer::new(4, 1);
        fb.write_char('中', 2);
        assert!(fb.cell_at(0, 0).unwrap().is_wide());
        assert!(fb.cell_at(1, 0).unwrap().is_continuation());

        // Overwriting the continuation blanks the leader
        fb.set_cursor_position(1, 0);
        fb.write_char('x', 1);
        assert_eq!(fb.cell_at(0, 0).unwrap(), &Cell::default());
        assert_eq!(fb.row_text(0), " x  ");
    }

    #[test]
    fn test_wide_char_wraps_when_it_does_not_fit() {
        let mut fb = FrameBuffer::new(3, 2);
        fb.set_cursor_position(2, 0);
        fb.write_char('国', 2);
        assert_eq!(fb.cell_at(0, 1).unwrap().c, '国');
        assert_eq!(fb.cursor_position(), (2, 1));
    }

    #[test]
    fn test_delete_chars_repairs_split_wide() {
        let mut fb = FrameBuffer::new(5, 1);
        fb.write_char('a', 1);
        fb.write_char('中', 2);
        fb.set_cursor_position(0, 0);
        fb.delete_chars(2);
        for cell in fb.row(0) {
            assert!(!cell.is_continuation() && !cell.is_wide());
        }
    }

    #[test]
    fn test_resize_keeps_top_left() {
        let mut fb = FrameBuffer::new(4, 2);
        for c in "abcd".chars() {
            fb.write_char(c, 1);
        }
        fb.resize(2, 3);
        assert_eq!(fb.row_text(0), "ab");
        assert_eq!(fb.height(), 3);
        assert_eq!(fb.cursor_position(), (1, 0));
    }

    #[test]
    fn test_zero_sized_buffer_is_inert() {
        let mut fb = FrameBuffer::new(0, 0);
        fb.write_char('a', 1);
        fb.line_feed();
        fb.set_cursor_position(5, 5);
        assert_eq!(fb.cursor_position(), (0, 0));
        assert!(fb.cell_at(0, 0).is_none());
    }

    #[test]
    fn test_widest_buffer_wraps_without_overflow() {
        let mut fb = FrameBuffer::new(u16::MAX, 2);
        fb.set_cursor_position(u16::MAX - 1, 0);
        fb.write_char('x', 1);
        assert_eq!(fb.cursor_position(), (u16::MAX - 1, 0));
        assert!(fb.wrap_pending());

        fb.set_cursor_position(u16::MAX - 1, 0);
        fb.write_char('中', 2);
        assert_eq!(fb.cell_at(0, 1).unwrap().c, '中');
        assert_eq!(fb.cursor_position(), (2, 1));
    }
}
