//! Keystroke translation
//!
//! The client always sends cursor keys in application form (`ESC O A`).
//! When the host application has not asked for application cursor keys,
//! those are rewritten to the ANSI form (`ESC [ A`) before reaching it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InputState {
    #[default]
    Ground,
    Escape,
    Ss3,
}

/// Cursor key mode selected by DECCKM (`CSI ? 1 h` / `CSI ? 1 l`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorKeyMode {
    #[default]
    Ansi,
    Application,
}

/// Translator for keystrokes on their way to the host
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    state: InputState,
}

impl UserInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one keystroke (a grapheme cluster) into bytes for the host
    pub fn translate(&mut self, keys: &str, mode: CursorKeyMode) -> String {
        let mut chars = keys.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            // Clusters of several code points are never part of a cursor key
            let pending = if self.state == InputState::Ss3 { "O" } else { "" };
            self.state = InputState::Ground;
            return format!("{pending}{keys}");
        };

        match self.state {
            InputState::Ground => {
                if c == '\x1b' {
                    self.state = InputState::Escape;
                }
                c.to_string()
            }
            InputState::Escape => {
                if c == 'O' {
                    // Hold the SS3 until the final byte is known
                    self.state = InputState::Ss3;
                    String::new()
                } else {
                    self.state = if c == '\x1b' {
                        InputState::Escape
                    } else {
                        InputState::Ground
                    };
                    c.to_string()
                }
            }
            InputState::Ss3 => {
                self.state = InputState::Ground;
                if mode == CursorKeyMode::Ansi && ('A'..='D').contains(&c) {
                    format!("[{c}")
                } else {
                    format!("O{c}")
                }
            }
        }
    }
}
