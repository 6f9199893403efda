//! Control function handlers
//!
//! Interprets the collected parameters, intermediates and OSC payload of a
//! dispatch action against the active frame buffer.

use crate::emulator::Emulator;
use crate::framebuffer::{Attributes, Color, FrameBuffer};
use crate::input::CursorKeyMode;
use tracing::trace;
use unicode_width::UnicodeWidthChar;

/// Numeric parameters of a control sequence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Params(Vec<u16>);

impl Params {
    /// Parse a raw parameter string such as `"4;4"` or `"38:2:1:2:3"`
    pub(crate) fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self(Vec::new());
        }

        let values = raw
            .split([';', ':'])
            .map(|field| {
                field.chars().fold(0u16, |acc, digit| {
                    let digit = digit.to_digit(10).unwrap_or(0) as u16;
                    acc.saturating_mul(10).saturating_add(digit)
                })
            })
            .collect();
        Self(values)
    }

    /// Parameter `index`, with zero or missing replaced by `default`
    pub(crate) fn get(&self, index: usize, default: u16) -> u16 {
        match self.0.get(index) {
            None | Some(0) => default,
            Some(&n) => n,
        }
    }

    /// Parameter `index` where zero is meaningful
    pub(crate) fn raw(&self, index: usize) -> u16 {
        self.0.get(index).copied().unwrap_or(0)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl Emulator {
    pub(crate) fn print(&mut self, c: char) {
        match c.width() {
            Some(width @ (1 | 2)) => self.framebuffer_mut().write_char(c, width as u8),
            // Combining marks and other zero-width characters are dropped
            _ => trace!(?c, "dropping zero-width character"),
        }
    }

    pub(crate) fn execute(&mut self, c: char) {
        let fb = self.framebuffer_mut();
        match c {
            // Backspace
            '\x08' => {
                let (x, y) = fb.cursor_position();
                fb.set_cursor_position(x.saturating_sub(1), y);
            }

            // Tab
            '\x09' => {
                let (x, y) = fb.cursor_position();
                let new_x = ((x / 8) + 1).saturating_mul(8);
                fb.set_cursor_position(new_x, y);
            }

            // Line feed, vertical tab, form feed, index
            '\x0a' | '\x0b' | '\x0c' | '\u{84}' => fb.line_feed(),

            // Carriage return
            '\x0d' => fb.carriage_return(),

            // Next line
            '\u{85}' => {
                fb.carriage_return();
                fb.line_feed();
            }

            // Reverse index
            '\u{8d}' => fb.reverse_line_feed(),

            // Bell
            '\x07' => {}

            _ => trace!(?c, "ignoring control character"),
        }
    }

    pub(crate) fn esc_dispatch(&mut self, c: char) {
        if !self.intermediates.is_empty() {
            trace!(intermediates = %self.intermediates, ?c, "ignoring escape sequence");
            return;
        }

        match c {
            // Save cursor
            '7' => {
                let fb = self.framebuffer();
                self.saved_cursor = Some((fb.cursor_position(), fb.pen()));
            }

            // Restore cursor
            '8' => {
                let ((x, y), pen) = self.saved_cursor.unwrap_or_default();
                let fb = self.framebuffer_mut();
                fb.set_cursor_position(x, y);
                fb.set_attrs(pen.attrs);
                fb.set_fg_color(pen.fg);
                fb.set_bg_color(pen.bg);
            }

            // Full reset
            'c' => self.reset(),

            'D' => self.framebuffer_mut().line_feed(),

            'E' => {
                let fb = self.framebuffer_mut();
                fb.carriage_return();
                fb.line_feed();
            }

            'M' => self.framebuffer_mut().reverse_line_feed(),

            _ => trace!(?c, "ignoring escape sequence"),
        }
    }

    pub(crate) fn csi_dispatch(&mut self, c: char) {
        let params = Params::parse(&self.params);
        let private = self.intermediates == "?";

        if private {
            match c {
                'h' => self.set_private_modes(&params, true),
                'l' => self.set_private_modes(&params, false),
                _ => trace!(?c, params = %self.params, "ignoring private sequence"),
            }
            return;
        }

        if !self.intermediates.is_empty() {
            trace!(intermediates = %self.intermediates, ?c, "ignoring control sequence");
            return;
        }

        match c {
            // Device status report
            'n' => match params.raw(0) {
                5 => self.terminal_to_host.push_str("\x1b[0n"),
                6 => {
                    let (x, y) = self.framebuffer().cursor_position();
                    let reply = format!("\x1b[{};{}R", y + 1, x + 1);
                    self.terminal_to_host.push_str(&reply);
                }
                _ => {}
            },

            // Device attributes: plain vt220
            'c' => {
                if params.raw(0) == 0 {
                    self.terminal_to_host.push_str("\x1b[?62c");
                }
            }

            _ => csi_on_framebuffer(self.framebuffer_mut(), &params, c),
        }
    }

    fn set_private_modes(&mut self, params: &Params, enable: bool) {
        for mode in params.iter() {
            match mode {
                1 => {
                    self.cursor_key_mode = if enable {
                        CursorKeyMode::Application
                    } else {
                        CursorKeyMode::Ansi
                    };
                }
                25 => self.framebuffer_mut().set_cursor_visible(enable),
                47 | 1047 | 1049 => {
                    if enable {
                        self.enter_alternate_screen();
                    } else {
                        self.exit_alternate_screen();
                    }
                }
                _ => trace!(mode, enable, "ignoring private mode"),
            }
        }
    }

    pub(crate) fn osc_dispatch(&mut self) {
        let Some((command, text)) = self.osc_string.split_once(';') else {
            trace!(osc = %self.osc_string, "ignoring OSC without payload");
            return;
        };

        match command {
            // Icon name and window title, or window title alone
            "0" | "2" => self.title = text.to_string(),
            _ => trace!(command, "ignoring OSC command"),
        }
    }
}

/// Control sequences that only touch the frame buffer
fn csi_on_framebuffer(fb: &mut FrameBuffer, params: &Params, c: char) {
    let (x, y) = fb.cursor_position();
    match c {
        // Cursor up
        'A' => fb.set_cursor_position(x, y.saturating_sub(params.get(0, 1))),

        // Cursor down
        'B' => fb.set_cursor_position(x, y.saturating_add(params.get(0, 1))),

        // Cursor forward
        'C' => fb.set_cursor_position(x.saturating_add(params.get(0, 1)), y),

        // Cursor backward
        'D' => fb.set_cursor_position(x.saturating_sub(params.get(0, 1)), y),

        // Cursor next line
        'E' => fb.set_cursor_position(0, y.saturating_add(params.get(0, 1))),

        // Cursor previous line
        'F' => fb.set_cursor_position(0, y.saturating_sub(params.get(0, 1))),

        // Cursor horizontal absolute
        'G' => fb.set_cursor_position(params.get(0, 1) - 1, y),

        // Line position absolute
        'd' => fb.set_cursor_position(x, params.get(0, 1) - 1),

        // Cursor position
        'H' | 'f' => fb.set_cursor_position(params.get(1, 1) - 1, params.get(0, 1) - 1),

        // Erase display
        'J' => match params.raw(0) {
            0 => fb.clear_to_end(),
            1 => fb.clear_to_cursor(),
            2 => fb.clear(),
            _ => {}
        },

        // Erase line
        'K' => match params.raw(0) {
            0 => fb.clear_to_eol(),
            1 => fb.clear_line_to_cursor(),
            2 => fb.clear_line(),
            _ => {}
        },

        'X' => fb.erase_chars(params.get(0, 1)),
        '@' => fb.insert_chars(params.get(0, 1)),
        'P' => fb.delete_chars(params.get(0, 1)),

        // SGR (Select Graphic Rendition)
        'm' => {
            if params.is_empty() {
                fb.reset_attrs();
            } else {
                let mut iter = params.iter();
                while let Some(code) = iter.next() {
                    handle_sgr(fb, code, &mut iter);
                }
            }
        }

        _ => trace!(?c, "ignoring control sequence"),
    }
}

fn update_attrs(fb: &mut FrameBuffer, update: impl FnOnce(&mut Attributes)) {
    let mut attrs = fb.current_attrs();
    update(&mut attrs);
    fb.set_attrs(attrs);
}

/// Extended color after a 38 or 48 code: `5;n` or `2;r;g;b`
fn extended_color<I>(params: &mut I) -> Option<Color>
where
    I: Iterator<Item = u16>,
{
    match params.next()? {
        5 => params.next().map(|n| Color::Indexed(n as u8)),
        2 => {
            let r = params.next().unwrap_or(0) as u8;
            let g = params.next().unwrap_or(0) as u8;
            let b = params.next().unwrap_or(0) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

/// Handle SGR (Select Graphic Rendition) codes
fn handle_sgr<I>(fb: &mut FrameBuffer, code: u16, params: &mut I)
where
    I: Iterator<Item = u16>,
{
    match code {
        0 => fb.reset_attrs(),

        // Attributes
        1 => update_attrs(fb, |a| a.bold = true),
        2 => update_attrs(fb, |a| a.dim = true),
        3 => update_attrs(fb, |a| a.italic = true),
        4 => update_attrs(fb, |a| a.underline = true),
        5 => update_attrs(fb, |a| a.blink = true),
        7 => update_attrs(fb, |a| a.reverse = true),
        8 => update_attrs(fb, |a| a.hidden = true),
        9 => update_attrs(fb, |a| a.strikethrough = true),

        // Reset attributes
        22 => update_attrs(fb, |a| {
            a.bold = false;
            a.dim = false;
        }),
        23 => update_attrs(fb, |a| a.italic = false),
        24 => update_attrs(fb, |a| a.underline = false),
        25 => update_attrs(fb, |a| a.blink = false),
        27 => update_attrs(fb, |a| a.reverse = false),
        28 => update_attrs(fb, |a| a.hidden = false),
        29 => update_attrs(fb, |a| a.strikethrough = false),

        // Foreground colors
        30..=37 => fb.set_fg_color(Color::Indexed((code - 30) as u8)),
        38 => {
            if let Some(color) = extended_color(params) {
                fb.set_fg_color(color);
            }
        }
        39 => fb.set_fg_color(Color::Default),

        // Background colors
        40..=47 => fb.set_bg_color(Color::Indexed((code - 40) as u8)),
        48 => {
            if let Some(color) = extended_color(params) {
                fb.set_bg_color(color);
            }
        }
        49 => fb.set_bg_color(Color::Default),

        // Bright foreground colors
        90..=97 => fb.set_fg_color(Color::Indexed((code - 90 + 8) as u8)),

        // Bright background colors
        100..=107 => fb.set_bg_color(Color::Indexed((code - 100 + 8) as u8)),

        _ => trace!(code, "ignoring SGR code"),
    }
}
