//! Terminal facing primitives for the build console.
//!
//! Two leaf concerns live here and nothing else:
//! - `capabilities`: one-shot detection of control protocol support and
//!   terminal size, with a static fallback when anything goes wrong.
//! - `ansi`: stateless control sequence builders. Each builder is a
//!   `crossterm::Command`, so callers emit them with `queue!` / `execute!`
//!   exactly like crossterm's own commands, and each also implements
//!   `Display` for direct string assembly.
//!
//! Neither module holds state beyond what the caller keeps; the console crate
//! owns all layout and screen state.

pub mod ansi;
pub mod capabilities;

pub use ansi::Color;
pub use capabilities::{ProbeError, SizeQuery, SttySizeQuery, TerminalCapabilities};
