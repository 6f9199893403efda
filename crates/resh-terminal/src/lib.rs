//! Terminal emulation for Resh
//!
//! A table-driven VT100 control-sequence parser, a screen model the parsed
//! actions are applied to, and a differ that renders the change between two
//! screens as escape sequences.

pub mod action;
pub mod display;
mod dispatch;
pub mod emulator;
pub mod framebuffer;
pub mod input;
pub mod parser;
pub mod transition;

pub use action::{Action, Resize};
pub use display::{render_row_ansi, Display};
pub use emulator::Emulator;
pub use framebuffer::{Attributes, Cell, Color, FrameBuffer, Renditions};
pub use input::{CursorKeyMode, UserInput};
pub use parser::Parser;
pub use transition::{ParserState, Transition};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Terminal size error: {0}")]
    SizeError(String),
}
