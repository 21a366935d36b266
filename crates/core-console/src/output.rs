//! Intercepted output channels.
//!
//! Rust offers no portable way to swap the process's standard streams, so the
//! console hands out `ConsoleWriter`s that stand in for them. Anything written
//! through a writer lands in the scrolling region above the status rows.
//! Writers also implement `MakeWriter`, which lets a `tracing_subscriber::fmt`
//! layer log through the console without corrupting the live rows.
//!
//! Writes never fail from the caller's point of view; sink errors are logged
//! and dropped.

use crate::console::Shared;
use core_terminal::Color;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
pub struct ConsoleWriter {
    shared: Arc<Shared>,
    markup: Option<Color>,
}

impl ConsoleWriter {
    pub(crate) fn new(shared: Arc<Shared>, markup: Option<Color>) -> Self {
        Self { shared, markup }
    }

    pub fn markup(&self) -> Option<Color> {
        self.markup
    }
}

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.write_output(buf, self.markup);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Format first, then write once, so a `writeln!` from one thread is
    /// never split by another thread's output.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(s) => self.write_all(s.as_bytes()),
            None => self.write_all(fmt::format(args).as_bytes()),
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl fmt::Debug for ConsoleWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleWriter")
            .field("markup", &self.markup)
            .finish()
    }
}
