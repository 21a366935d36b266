//! Terminal writer abstraction.
//!
//! Both screen writers (redraw pass and scrolling interceptor) record a short
//! list of commands, then translate them into bytes and hand the sink a single
//! `write_all` + `flush`. A partially written pass is therefore never
//! interleaved with another writer's bytes at the sink level.
//!
//! Design invariants:
//! * Commands preserve ordering; nothing reaches the sink before `flush_to`.
//! * All movement is relative to the current cursor row; the console never
//!   addresses absolute screen coordinates.
//! * The writer owns no global state; it is a short-lived object per write.

use core_terminal::Color;
use core_terminal::ansi::{
    ClearLine, CursorUp, HideCursor, ResetAttributes, SetForeground, ShowCursor, ToLineStart,
};
use crossterm::{queue, style::Print};
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Line feed; moves to the next row and scrolls at the screen bottom.
    NewLine,
    LineStart,
    CursorUp(u16),
    ClearLine,
    HideCursor,
    ShowCursor,
    Foreground(Color),
    Reset,
    Print(String),
}

#[derive(Debug, Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }
    pub fn new_line(&mut self) {
        self.cmds.push(Command::NewLine);
    }
    pub fn line_start(&mut self) {
        self.cmds.push(Command::LineStart);
    }
    /// Zero rows emits nothing (terminals read `ESC[0A` as one row).
    pub fn cursor_up(&mut self, rows: usize) {
        if rows > 0 {
            let rows = u16::try_from(rows).unwrap_or(u16::MAX);
            self.cmds.push(Command::CursorUp(rows));
        }
    }
    pub fn clear_line(&mut self) {
        self.cmds.push(Command::ClearLine);
    }
    pub fn hide_cursor(&mut self) {
        self.cmds.push(Command::HideCursor);
    }
    pub fn show_cursor(&mut self) {
        self.cmds.push(Command::ShowCursor);
    }
    pub fn print<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::Print(s));
        }
    }
    /// Print wrapped in foreground markup when a color is given.
    pub fn print_marked<S: Into<String>>(&mut self, s: S, markup: Option<Color>) {
        let s: String = s.into();
        if s.is_empty() {
            return;
        }
        match markup {
            Some(color) => {
                self.cmds.push(Command::Foreground(color));
                self.cmds.push(Command::Print(s));
                self.cmds.push(Command::Reset);
            }
            None => self.cmds.push(Command::Print(s)),
        }
    }
    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Encode all commands to bytes without touching a sink.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        for c in &self.cmds {
            match c {
                Command::NewLine => queue!(buf, Print('\n'))?,
                Command::LineStart => queue!(buf, ToLineStart)?,
                Command::CursorUp(n) => queue!(buf, CursorUp(*n))?,
                Command::ClearLine => queue!(buf, ClearLine)?,
                Command::HideCursor => queue!(buf, HideCursor)?,
                Command::ShowCursor => queue!(buf, ShowCursor)?,
                Command::Foreground(color) => queue!(buf, SetForeground(*color))?,
                Command::Reset => queue!(buf, ResetAttributes)?,
                Command::Print(s) => queue!(buf, Print(s))?,
            }
        }
        Ok(buf)
    }

    pub fn flush_to(self, out: &mut dyn Write) -> io::Result<()> {
        if self.cmds.is_empty() {
            return Ok(());
        }
        let buf = self.encode()?;
        out.write_all(&buf)?;
        out.flush()
    }
}
