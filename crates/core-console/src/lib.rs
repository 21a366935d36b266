//! Terminal output multiplexer for concurrent build actions.
//!
//! Any number of producer threads each own a live status row on a shared
//! terminal while ordinary output keeps scrolling above those rows. Exactly
//! one background thread paints the status rows; producers only mutate shared
//! layout and flip a one-slot wake signal, so they never wait on terminal I/O.
//!
//! Screen layout on a capable terminal:
//!
//! ```text
//!   ...scrolled output...
//!   <bottom line: live preview of unterminated output>   <- cursor rests here
//!   [slot 0]
//!   [slot 1]            slot_count = floor(rows / rows_per_slot)
//!   ...
//! ```
//!
//! Components, leaf first:
//! - `core_terminal` (separate crate): capability probe and control sequences.
//! - `slots`: slot table plus FIFO overflow queue; plain data behind one mutex.
//! - `writer`: command list flushed to the sink in one write.
//! - `scroll`: scrolling-output interceptor and owner of the physical sink.
//! - `redraw`: diffing pass and the background redraw thread.
//! - `console`: reference-counted facade, setup and teardown.
//! - `status_line` / `output`: the handles build actions actually hold.
//!
//! Degraded terminals (not a tty, `TERM=dumb`, failed size query, or
//! `plain = true`) get zero slots, no redraw thread and verbatim output.
//!
//! Known limitation: the layout is computed once at open; a terminal resized
//! afterwards is not re-probed.

pub mod console;
pub mod output;
pub mod redraw;
pub mod scroll;
pub mod slots;
pub mod status_line;
pub mod testing;
pub mod writer;

pub(crate) use console::{Shared, lock};

pub use console::Console;
pub use core_config::ConsoleConfig;
pub use core_terminal::{Color, TerminalCapabilities};
pub use output::ConsoleWriter;
pub use slots::{LineId, LinePosition};
pub use status_line::{StatusLine, StatusLineWriter};
