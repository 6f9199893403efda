//! Typed actions produced by the control-sequence parser
//!
//! An [`Action`] describes what should happen for one input symbol. Parser
//! actions carry the symbol that triggered them; entry and exit actions of a
//! parser state carry nothing. `UserByte` and `Resize` never come out of the
//! parser, they are synthesized locally and flow through the same dispatch.

/// New terminal geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resize {
    pub width: u16,
    pub height: u16,
}

impl Resize {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

/// One decoded action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Ignore,
    Print(char),
    Execute(char),
    Clear,
    Collect(char),
    Param(char),
    EscDispatch(char),
    CsiDispatch(char),
    Hook,
    Put(char),
    Unhook,
    OscStart,
    OscPut(char),
    OscEnd,
    /// A keystroke: one grapheme cluster typed by the user
    UserByte(String),
    Resize(Resize),
}

impl Action {
    /// The symbol captured when the action was produced, if any
    pub fn symbol(&self) -> Option<char> {
        match self {
            Action::Print(c)
            | Action::Execute(c)
            | Action::Collect(c)
            | Action::Param(c)
            | Action::EscDispatch(c)
            | Action::CsiDispatch(c)
            | Action::Put(c)
            | Action::OscPut(c) => Some(*c),
            Action::UserByte(chs) => chs.chars().next(),
            _ => None,
        }
    }

    /// Whether the action is present in the captured-symbol sense
    pub fn is_present(&self) -> bool {
        self.symbol().is_some()
    }

    /// Ignore actions are dropped before reaching a consumer
    pub fn is_ignore(&self) -> bool {
        matches!(self, Action::Ignore)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Ignore => "Ignore",
            Action::Print(_) => "Print",
            Action::Execute(_) => "Execute",
            Action::Clear => "Clear",
            Action::Collect(_) => "Collect",
            Action::Param(_) => "Param",
            Action::EscDispatch(_) => "EscDispatch",
            Action::CsiDispatch(_) => "CsiDispatch",
            Action::Hook => "Hook",
            Action::Put(_) => "Put",
            Action::Unhook => "Unhook",
            Action::OscStart => "OscStart",
            Action::OscPut(_) => "OscPut",
            Action::OscEnd => "OscEnd",
            Action::UserByte(_) => "UserByte",
            Action::Resize(_) => "Resize",
        }
    }
}
