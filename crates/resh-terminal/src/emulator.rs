//! Terminal emulator core implementation
//!
//! Manages terminal state and applies parsed actions to it

use crate::{
    action::{Action, Resize},
    framebuffer::{FrameBuffer, Renditions},
    input::{CursorKeyMode, UserInput},
    parser::Parser,
    TerminalError,
};
use tracing::warn;

/// Terminal emulator
#[derive(Debug, Clone)]
pub struct Emulator {
    /// The parser for escape sequences
    parser: Parser,

    /// Primary screen content
    primary: FrameBuffer,

    /// Alternate screen buffer, present while full-screen apps own the display
    alternate: Option<FrameBuffer>,

    /// Terminal title
    pub(crate) title: String,

    /// Parameter characters of the sequence being collected
    pub(crate) params: String,

    /// Intermediate characters of the sequence being collected
    pub(crate) intermediates: String,

    /// Payload of the OSC string being collected
    pub(crate) osc_string: String,

    pub(crate) cursor_key_mode: CursorKeyMode,

    /// Cursor and pen saved by DECSC
    pub(crate) saved_cursor: Option<((u16, u16), Renditions)>,

    /// Cursor position to restore when leaving the alternate screen
    alternate_saved_cursor: Option<(u16, u16)>,

    user: UserInput,

    /// Replies and translated keystrokes waiting to be written to the host
    pub(crate) terminal_to_host: String,
}

impl PartialEq for Emulator {
    fn eq(&self, other: &Self) -> bool {
        self.framebuffer() == other.framebuffer() && self.title == other.title
    }
}

impl Eq for Emulator {}

impl Emulator {
    /// Create a new terminal with given dimensions
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            parser: Parser::new(),
            primary: FrameBuffer::new(width, height),
            alternate: None,
            title: String::new(),
            params: String::new(),
            intermediates: String::new(),
            osc_string: String::new(),
            cursor_key_mode: CursorKeyMode::default(),
            saved_cursor: None,
            alternate_saved_cursor: None,
            user: UserInput::new(),
            terminal_to_host: String::new(),
        }
    }

    /// Process host output, returning bytes the terminal answers with
    pub fn handle_stream(&mut self, data: &[u8]) -> Vec<u8> {
        for action in self.parser.feed(data) {
            self.apply(&action);
        }
        std::mem::take(&mut self.terminal_to_host).into_bytes()
    }

    /// Apply one action, returning bytes destined for the host
    pub fn act(&mut self, action: &Action) -> Vec<u8> {
        self.apply(action);
        std::mem::take(&mut self.terminal_to_host).into_bytes()
    }

    fn apply(&mut self, action: &Action) {
        match action {
            Action::Ignore => {}
            Action::Print(c) => self.print(*c),
            Action::Execute(c) => self.execute(*c),
            Action::Clear => {
                self.params.clear();
                self.intermediates.clear();
            }
            Action::Collect(c) => self.intermediates.push(*c),
            Action::Param(c) => self.params.push(*c),
            Action::EscDispatch(c) => self.esc_dispatch(*c),
            Action::CsiDispatch(c) => self.csi_dispatch(*c),
            // Device control strings are consumed without effect
            Action::Hook | Action::Put(_) | Action::Unhook => {}
            Action::OscStart => self.osc_string.clear(),
            Action::OscPut(c) => self.osc_string.push(*c),
            Action::OscEnd => self.osc_dispatch(),
            Action::UserByte(keys) => {
                let bytes = self.user.translate(keys, self.cursor_key_mode);
                self.terminal_to_host.push_str(&bytes);
            }
            Action::Resize(Resize { width, height }) => {
                if let Err(e) = self.resize(*width, *height) {
                    warn!("Ignoring resize to {}x{}: {}", width, height, e);
                }
            }
        }
    }

    /// Resize the terminal
    pub fn resize(&mut self, width: u16, height: u16) -> Result<(), TerminalError> {
        if width == 0 || height == 0 {
            return Err(TerminalError::SizeError(format!(
                "Invalid terminal size {width}x{height}"
            )));
        }

        self.primary.resize(width, height);
        if let Some(ref mut alt) = self.alternate {
            alt.resize(width, height);
        }

        Ok(())
    }

    /// Drop any partially parsed sequence
    pub fn reset_input(&mut self) {
        self.parser.reset_input();
    }

    /// Full reset, keeping the geometry
    pub(crate) fn reset(&mut self) {
        let (width, height) = self.dimensions();
        let parser = std::mem::take(&mut self.parser);
        *self = Self::new(width, height);
        self.parser = parser;
    }

    /// Get current frame buffer
    pub fn framebuffer(&self) -> &FrameBuffer {
        self.alternate.as_ref().unwrap_or(&self.primary)
    }

    /// Get mutable frame buffer
    pub fn framebuffer_mut(&mut self) -> &mut FrameBuffer {
        self.alternate.as_mut().unwrap_or(&mut self.primary)
    }

    /// Get terminal title
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cursor_key_mode(&self) -> CursorKeyMode {
        self.cursor_key_mode
    }

    pub fn is_alternate_screen(&self) -> bool {
        self.alternate.is_some()
    }

    /// Switch to alternate screen buffer
    pub fn enter_alternate_screen(&mut self) {
        if self.alternate.is_none() {
            let mut alt = self.primary.clone();
            alt.clear();
            self.alternate = Some(alt);

            // Save cursor position
            self.alternate_saved_cursor = Some(self.primary.cursor_position());
        }
    }

    /// Switch back to primary screen buffer
    pub fn exit_alternate_screen(&mut self) {
        if self.alternate.take().is_some() {
            // Restore cursor position
            if let Some((x, y)) = self.alternate_saved_cursor.take() {
                self.primary.set_cursor_position(x, y);
            }
        }
    }

    /// Get terminal dimensions
    pub fn dimensions(&self) -> (u16, u16) {
        (self.primary.width(), self.primary.height())
    }

    pub fn width(&self) -> u16 {
        self.primary.width()
    }

    pub fn height(&self) -> u16 {
        self.primary.height()
    }

    /// Visible text, one line per row with trailing blanks trimmed
    pub fn screen_text(&self) -> String {
        let fb = self.framebuffer();
        (0..fb.height())
            .map(|y| fb.row_text(y).trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_output() {
        let mut term = Emulator::new(80, 24);
        term.handle_stream(b"Hello, World!");

        let fb = term.framebuffer();
        assert_eq!(fb.cell_at(0, 0).unwrap().c, 'H');
        assert_eq!(fb.cell_at(12, 0).unwrap().c, '!');
        assert_eq!(fb.cursor_position(), (13, 0));
    }

    #[test]
    fn test_device_status_replies() {
        let mut term = Emulator::new(80, 24);
        assert_eq!(term.handle_stream(b"\x1b[5n"), b"\x1b[0n");
        assert_eq!(term.handle_stream(b"\x1b[3;4H\x1b[6n"), b"\x1b[3;4R");
        assert_eq!(term.handle_stream(b"\x1b[c"), b"\x1b[?62c");
    }

    #[test]
    fn test_title_from_osc() {
        let mut term = Emulator::new(10, 2);
        term.handle_stream(b"\x1b]0;first\x07");
        assert_eq!(term.title(), "first");
        term.handle_stream(b"\x1b]2;second\x1b\\");
        assert_eq!(term.title(), "second");
    }

    #[test]
    fn test_alternate_screen_round_trip() {
        let mut term = Emulator::new(10, 3);
        term.handle_stream(b"main\x1b[?1049h");
        assert!(term.is_alternate_screen());
        assert_eq!(term.screen_text(), "\n\n");

        term.handle_stream(b"\x1b[Hfull");
        term.handle_stream(b"\x1b[?1049l");
        assert!(!term.is_alternate_screen());
        assert_eq!(term.screen_text(), "main\n\n");
        assert_eq!(term.framebuffer().cursor_position(), (4, 0));
    }

    #[test]
    fn test_resize_rejects_zero() {
        let mut term = Emulator::new(10, 3);
        assert!(term.resize(0, 3).is_err());
        term.act(&Action::Resize(Resize::new(0, 0)));
        assert_eq!(term.dimensions(), (10, 3));

        term.act(&Action::Resize(Resize::new(20, 5)));
        assert_eq!(term.dimensions(), (20, 5));
    }

    #[test]
    fn test_user_byte_goes_to_host() {
        let mut term = Emulator::new(10, 3);
        let mut out = Vec::new();
        for key in ["\x1b", "O", "B"] {
            out.extend(term.act(&Action::UserByte(key.to_string())));
        }
        assert_eq!(out, b"\x1b[B");

        term.handle_stream(b"\x1b[?1h");
        let mut out = Vec::new();
        for key in ["\x1b", "O", "B"] {
            out.extend(term.act(&Action::UserByte(key.to_string())));
        }
        assert_eq!(out, b"\x1bOB");
    }

    #[test]
    fn test_equality_ignores_pen_and_parser() {
        let a = Emulator::new(10, 3);
        let mut b = Emulator::new(10, 3);
        b.handle_stream(b"\x1b[1;31m\x1b[");
        assert_eq!(a, b);

        b.handle_stream(b"0mx");
        assert_ne!(a, b);
    }
}
