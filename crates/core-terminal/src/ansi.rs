//! Control sequence builders.
//!
//! Every sequence is prefixed `ESC [` and emitted verbatim; no terminfo lookup
//! happens. Builders perform no validation beyond what the integer types
//! enforce. Note that most terminals read a count of `0` as `1`, so callers
//! skip cursor movement entirely when they have nothing to move.
//!
//! ```text
//! ToLineStart          ESC[G
//! CursorUp(n)          ESC[{n}A
//! CursorDown(n)        ESC[{n}B
//! ClearLine            ESC[2K
//! HideCursor           ESC[?25l
//! ShowCursor           ESC[?25h
//! SetForeground(c)     ESC[{30+code}m
//! ResetAttributes      ESC[0m
//! ```

use crossterm::Command;
use std::fmt;

/// Closed foreground palette understood by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Color {
    pub const fn code(self) -> u8 {
        match self {
            Color::Red => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Blue => 4,
            Color::Magenta => 5,
            Color::Cyan => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToLineStart;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorUp(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorDown(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HideCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetForeground(pub Color);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetAttributes;

impl fmt::Display for ToLineStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\x1b[G")
    }
}

impl fmt::Display for CursorUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}A", self.0)
    }
}

impl fmt::Display for CursorDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}B", self.0)
    }
}

impl fmt::Display for ClearLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\x1b[2K")
    }
}

impl fmt::Display for HideCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\x1b[?25l")
    }
}

impl fmt::Display for ShowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\x1b[?25h")
    }
}

impl fmt::Display for SetForeground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{}m", 30 + self.0.code())
    }
}

impl fmt::Display for ResetAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\x1b[0m")
    }
}

// All builders are plain ANSI; on Windows crossterm routes them through the
// VT path, which the console only enables when the probe succeeded.
macro_rules! ansi_command {
    ($($ty:ty),+ $(,)?) => {$(
        impl Command for $ty {
            fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
                write!(f, "{self}")
            }

            #[cfg(windows)]
            fn execute_winapi(&self) -> std::io::Result<()> {
                Err(std::io::Error::other("control sequences require VT support"))
            }

            #[cfg(windows)]
            fn is_ansi_code_support_enabled(&self) -> bool {
                true
            }
        }
    )+};
}

ansi_command!(
    ToLineStart,
    CursorUp,
    CursorDown,
    ClearLine,
    HideCursor,
    ShowCursor,
    SetForeground,
    ResetAttributes,
);
