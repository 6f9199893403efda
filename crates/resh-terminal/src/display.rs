//! Terminal display differ
//!
//! Produces the escape sequences that turn a terminal showing one emulator
//! state into a terminal showing another.

use crate::emulator::Emulator;
use crate::framebuffer::{Cell, Color, FrameBuffer, Renditions};
use std::fmt::Write;

/// Stateless screen differ
#[derive(Debug, Clone, Copy, Default)]
pub struct Display;

/// What the differ knows about the receiving terminal while it writes
struct FrameState {
    out: String,
    /// `None` once the position can't be trusted (after a write at the
    /// right margin, or before the first move)
    cursor: Option<(u16, u16)>,
    pen: Option<Renditions>,
}

impl FrameState {
    fn move_to(&mut self, x: u16, y: u16) {
        if self.cursor != Some((x, y)) {
            let _ = write!(self.out, "\x1b[{};{}H", y + 1, x + 1);
            self.cursor = Some((x, y));
        }
    }

    fn put_cell(&mut self, x: u16, y: u16, cell: &Cell, width: u16) {
        self.move_to(x, y);

        let renditions = cell.renditions();
        if self.pen != Some(renditions) {
            self.out.push_str(&cell_to_ansi(cell));
            self.pen = Some(renditions);
        }
        self.out.push(cell.c);

        self.cursor = x
            .checked_add(u16::from(cell.width.max(1)))
            .filter(|advance| *advance < width)
            .map(|advance| (advance, y));
    }
}

impl Display {
    pub fn new() -> Self {
        Self
    }

    /// Bytes that update a terminal showing `from` so that it shows `to`
    ///
    /// When `initialized` is false, or the geometry changed, nothing is
    /// assumed about the receiver and the whole screen is repainted.
    pub fn new_frame(&self, initialized: bool, from: &Emulator, to: &Emulator) -> Vec<u8> {
        let from_fb = from.framebuffer();
        let to_fb = to.framebuffer();
        let repaint = !initialized || from.dimensions() != to.dimensions();

        let mut frame = FrameState {
            out: String::new(),
            cursor: None,
            pen: None,
        };

        if repaint {
            frame.out.push_str("\x1b[0m\x1b[H\x1b[2J");
            frame.cursor = Some((0, 0));
            frame.pen = Some(Renditions::default());
        }

        if from.title() != to.title() || (!initialized && !to.title().is_empty()) {
            let _ = write!(frame.out, "\x1b]2;{}\x07", to.title());
        }

        let blank = Cell::default();
        let mut wrote = false;
        for y in 0..to_fb.height() {
            for x in 0..to_fb.width() {
                let Some(cell) = to_fb.cell_at(x, y) else {
                    continue;
                };
                if cell.is_continuation() {
                    continue;
                }

                let old = |x: u16| -> Cell {
                    if repaint {
                        blank
                    } else {
                        from_fb.cell_at(x, y).copied().unwrap_or(blank)
                    }
                };
                let changed = *cell != old(x)
                    || (cell.is_wide() && to_fb.cell_at(x + 1, y).copied() != Some(old(x + 1)));
                if changed {
                    frame.put_cell(x, y, cell, to_fb.width());
                    wrote = true;
                }
            }
        }

        let (cursor_x, cursor_y) = to_fb.cursor_position();
        let cursor_moved = match frame.cursor {
            Some(position) => position != (cursor_x, cursor_y),
            None => wrote || from_fb.cursor_position() != (cursor_x, cursor_y),
        };
        if cursor_moved && to_fb.width() > 0 && to_fb.height() > 0 {
            frame.cursor = None;
            frame.move_to(cursor_x, cursor_y);
        }

        if !initialized || from_fb.cursor_visible() != to_fb.cursor_visible() {
            frame
                .out
                .push_str(if to_fb.cursor_visible() { "\x1b[?25h" } else { "\x1b[?25l" });
        }

        frame.out.into_bytes()
    }
}

/// Render a row of cells to a string with ANSI escape codes
pub fn render_row_ansi(fb: &FrameBuffer, row: u16) -> String {
    let mut output = String::new();
    let mut last = Renditions::default();

    for cell in fb.row(row) {
        if cell.is_continuation() {
            continue;
        }

        // Check if we need to update attributes
        if cell.renditions() != last {
            output.push_str(&cell_to_ansi(cell));
            last = cell.renditions();
        }

        output.push(cell.c);
    }

    // Reset at end of line
    output.push_str("\x1b[0m");
    output
}

fn push_color(codes: &mut Vec<u16>, color: Color, base: u16, bright_base: u16, extended: u16) {
    match color {
        Color::Default => {}
        Color::Indexed(n) if n < 8 => codes.push(base + n as u16),
        Color::Indexed(n) if n < 16 => codes.push(bright_base + (n - 8) as u16),
        Color::Indexed(n) => codes.extend([extended, 5, n as u16]),
        Color::Rgb(r, g, b) => codes.extend([extended, 2, r as u16, g as u16, b as u16]),
    }
}

/// Convert cell attributes to an absolute ANSI SGR sequence
fn cell_to_ansi(cell: &Cell) -> String {
    // Reset first
    let mut codes = vec![0];

    // Text attributes
    let attrs = &cell.attrs;
    for (set, code) in [
        (attrs.bold, 1),
        (attrs.dim, 2),
        (attrs.italic, 3),
        (attrs.underline, 4),
        (attrs.blink, 5),
        (attrs.reverse, 7),
        (attrs.hidden, 8),
        (attrs.strikethrough, 9),
    ] {
        if set {
            codes.push(code);
        }
    }

    push_color(&mut codes, cell.fg, 30, 90, 38);
    push_color(&mut codes, cell.bg, 40, 100, 48);

    // Build escape sequence
    if codes.len() == 1 {
        "\x1b[0m".to_string()
    } else {
        format!(
            "\x1b[{}m",
            codes
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(";")
        )
    }
}
