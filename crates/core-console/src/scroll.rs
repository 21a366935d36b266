//! Scrolling-output interceptor.
//!
//! `Screen` owns the physical sink and the single piece of scrolling state:
//! the residual unterminated text of the last write, shown as a live preview on
//! the bottom line of the scrolling region until a newline completes it.
//!
//! Cursor model shared with the redraw pass: between writes the cursor rests on
//! the scrolling region's bottom line, just after the preview text. The
//! reserved status rows are the `slot_count` lines directly below it.
//!
//! A write:
//! 1. prepends the residual preview bytes,
//! 2. returns to the start of the bottom line and clears it,
//! 3. emits every complete line (optionally wrapped in color markup), a line
//!    feed, then clears the row it lands on so stale status text never shows
//!    through,
//! 4. breaks a run that reaches the terminal width exactly as terminal
//!    auto-wrap would, so text never overruns into the reserved rows,
//! 5. keeps the unterminated tail as the new preview and echoes it once.
//!
//! Escape sequences in the input take no width and are never split by a
//! forced break. Tabs are expanded to spaces up to the next stop of 8 and stop
//! at the right edge. Carriage returns are dropped. A trailing partial UTF-8
//! or escape sequence is held back until the rest arrives. When the other
//! channel writes while a preview is pending, the preview is completed first
//! so each line keeps its own markup.
//!
//! When the control protocol is unavailable the interceptor is bypassed and
//! bytes reach the sink untouched.

use crate::writer::Writer;
use core_events::{FORCED_WRAPS, SCROLL_WRITES};
use core_terminal::Color;
use std::io::{self, Write};
use std::sync::atomic::Ordering;
use unicode_width::UnicodeWidthChar;

pub struct Screen {
    out: Box<dyn Write + Send>,
    protocol: bool,
    columns: usize,
    pending: String,
    pending_markup: Option<Color>,
    /// Incomplete escape or UTF-8 bytes waiting for the next write; never
    /// echoed.
    held: Vec<u8>,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("protocol", &self.protocol)
            .field("columns", &self.columns)
            .field("pending", &self.pending)
            .field("held", &self.held.len())
            .finish_non_exhaustive()
    }
}

const TAB_STOP: usize = 8;

/// Split off a trailing incomplete UTF-8 sequence. Invalid bytes elsewhere
/// are replaced, never dropped silently.
fn split_incomplete_utf8(data: &[u8]) -> (String, &[u8]) {
    match std::str::from_utf8(data) {
        Ok(s) => (s.to_string(), &[]),
        Err(e) if e.error_len().is_none() => {
            let (head, tail) = data.split_at(e.valid_up_to());
            (String::from_utf8_lossy(head).into_owned(), tail)
        }
        Err(_) => (String::from_utf8_lossy(data).into_owned(), &[]),
    }
}

/// Byte length of the escape sequence `s` starts with, or `None` while its
/// final byte has not arrived yet.
fn escape_len(s: &str) -> Option<usize> {
    let mut chars = s.char_indices().skip(1);
    match chars.next()? {
        (_, '[') => chars
            .find(|(_, c)| ('@'..='~').contains(c))
            .map(|(i, c)| i + c.len_utf8()),
        (i, c) => Some(i + c.len_utf8()),
    }
}

impl Screen {
    pub fn new(out: Box<dyn Write + Send>, protocol: bool, columns: u16) -> Self {
        Self {
            out,
            protocol,
            columns: usize::from(columns.max(1)),
            pending: String::new(),
            pending_markup: None,
            held: Vec::new(),
        }
    }

    pub fn supports_protocol(&self) -> bool {
        self.protocol
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Residual preview text, if any.
    pub fn preview(&self) -> Option<(String, Option<Color>)> {
        if self.pending.is_empty() {
            return None;
        }
        Some((self.pending.clone(), self.pending_markup))
    }

    /// Render `bytes` into the scrolling region.
    pub fn write(&mut self, bytes: &[u8], markup: Option<Color>) -> io::Result<()> {
        SCROLL_WRITES.fetch_add(1, Ordering::Relaxed);
        if !self.protocol {
            return self.write_raw(bytes);
        }

        let mut w = Writer::new();
        w.line_start();
        w.clear_line();

        // A partial line from the other channel keeps its own markup.
        if !self.pending.is_empty() && self.pending_markup != markup {
            let previous = std::mem::take(&mut self.pending);
            Self::complete_line(&mut w, previous, self.pending_markup);
            self.held.clear();
        }

        let mut data = std::mem::take(&mut self.pending).into_bytes();
        data.append(&mut self.held);
        data.extend_from_slice(bytes);
        let (text, utf8_tail) = split_incomplete_utf8(&data);

        let mut line = String::new();
        let mut width = 0usize;
        let mut rest = text.as_str();
        let mut held_escape = "";
        while let Some(ch) = rest.chars().next() {
            if ch == '\x1b' {
                let Some(len) = escape_len(rest) else {
                    held_escape = rest;
                    break;
                };
                // Zero width, and never split by a forced break.
                line.push_str(&rest[..len]);
                rest = &rest[len..];
                continue;
            }
            rest = &rest[ch.len_utf8()..];
            match ch {
                '\r' => {}
                '\n' => {
                    Self::complete_line(&mut w, std::mem::take(&mut line), markup);
                    width = 0;
                }
                '\t' => {
                    // Next stop, clamped at the right edge like a terminal tab.
                    let spaces =
                        (TAB_STOP - width % TAB_STOP).min(self.columns.saturating_sub(width));
                    line.extend(std::iter::repeat_n(' ', spaces));
                    width += spaces;
                }
                _ => {
                    let cw = ch.width().unwrap_or(0);
                    if width > 0 && width + cw > self.columns {
                        FORCED_WRAPS.fetch_add(1, Ordering::Relaxed);
                        Self::complete_line(&mut w, std::mem::take(&mut line), markup);
                        width = 0;
                    }
                    line.push(ch);
                    width += cw;
                }
            }
        }

        w.print_marked(line.as_str(), markup);
        self.pending = line;
        self.pending_markup = markup;
        let mut held = held_escape.as_bytes().to_vec();
        held.extend_from_slice(utf8_tail);
        self.held = held;

        w.flush_to(&mut self.out)
    }

    fn complete_line(w: &mut Writer, line: String, markup: Option<Color>) {
        w.print_marked(line, markup);
        w.new_line();
        w.clear_line();
    }

    /// Bytes straight to the sink, bypassing layout.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.out.flush()
    }

    /// Emit an already assembled command list (redraw passes, setup, teardown).
    pub fn emit(&mut self, w: Writer) -> io::Result<()> {
        w.flush_to(&mut self.out)
    }

    /// Terminate the preview as a completed line. Returns whether one existed.
    pub fn complete_preview(&mut self, w: &mut Writer) -> bool {
        self.held.clear();
        if self.pending.is_empty() {
            return false;
        }
        self.pending.clear();
        self.pending_markup = None;
        w.new_line();
        w.clear_line();
        true
    }
}
