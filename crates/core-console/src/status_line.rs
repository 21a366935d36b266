//! Scoped status line handles.
//!
//! A `StatusLine` is the capability to drive one live row: it carries its own
//! `LineId`, so no thread identity lookup is ever needed. Acquisition is eager
//! (the line is bound to a slot or queued as soon as the handle exists) and
//! release happens on `close`, on `release`, or on drop, whichever comes
//! first. Every call is infallible; after the console is torn down they are
//! no-ops.

use crate::console::Shared;
use crate::slots::{LineId, LinePosition};
use core_terminal::Color;
use core_terminal::ansi::{ResetAttributes, SetForeground};
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

pub struct StatusLine {
    id: LineId,
    shared: Arc<Shared>,
    released: bool,
}

impl StatusLine {
    pub(crate) fn acquire(shared: Arc<Shared>) -> Self {
        let id = LineId::next();
        shared.acquire(id);
        Self {
            id,
            shared,
            released: false,
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn position(&self) -> LinePosition {
        self.shared.position(self.id)
    }

    /// Text last recorded for this line, visible or queued.
    pub fn text(&self) -> Option<String> {
        self.shared.text_of(self.id)
    }

    /// Replace the displayed text. Rendering happens on the redraw thread;
    /// this only records the value and requests a pass.
    pub fn update(&self, text: impl Into<String>) {
        if !self.released {
            self.shared.update(self.id, text.into());
        }
    }

    /// `update` with preformatted arguments; see the `status!` macro.
    pub fn update_fmt(&self, args: fmt::Arguments<'_>) {
        match args.as_str() {
            Some(s) => self.update(s),
            None => self.update(fmt::format(args)),
        }
    }

    /// Text rendered in one palette color.
    pub fn update_colored(&self, color: Color, text: impl fmt::Display) {
        self.update(format!("{}{text}{}", SetForeground(color), ResetAttributes));
    }

    /// Line-buffered writer view for adapting existing log output.
    pub fn writer(&self) -> StatusLineWriter<'_> {
        StatusLineWriter {
            line: self,
            buf: Vec::new(),
        }
    }

    /// Give up the slot (or queue entry). Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.release(self.id);
        }
    }

    pub fn close(mut self) {
        self.release();
    }
}

impl Drop for StatusLine {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusLine")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

/// Buffers bytes until a line terminator or an explicit flush, then shows the
/// last complete line on the status row. Remaining bytes are flushed on drop.
pub struct StatusLineWriter<'a> {
    line: &'a StatusLine,
    buf: Vec<u8>,
}

impl StatusLineWriter<'_> {
    fn publish(&self, bytes: &[u8]) {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        self.line.update(String::from_utf8_lossy(bytes).into_owned());
    }
}

impl Write for StatusLineWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if let Some(end) = self.buf.iter().rposition(|b| *b == b'\n') {
            let complete: Vec<u8> = self.buf.drain(..=end).collect();
            let body = &complete[..complete.len() - 1];
            let last = match body.iter().rposition(|b| *b == b'\n') {
                Some(i) => &body[i + 1..],
                None => body,
            };
            self.publish(last);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let pending = std::mem::take(&mut self.buf);
            self.publish(&pending);
        }
        Ok(())
    }
}

impl Drop for StatusLineWriter<'_> {
    fn drop(&mut self) {
        self.flush().ok();
    }
}

/// Format and push text to a status line:
/// `status!(line, "compiling {} ({}/{})", name, done, total)`.
#[macro_export]
macro_rules! status {
    ($line:expr, $($arg:tt)*) => {
        $line.update_fmt(::std::format_args!($($arg)*))
    };
}
