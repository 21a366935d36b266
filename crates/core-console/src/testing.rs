//! Test doubles for the physical terminal.
//!
//! `CaptureSink` records every byte the console emits. `VirtualScreen` replays
//! those bytes against a minimal model that understands exactly the sequences
//! the console produces, so tests can assert on what a user would see rather
//! than on raw escape strings.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable in-memory sink; all clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Unbounded-height screen model. Line feeds always move down (as with a
/// terminal that scrolls), so row indices are stable across a whole replay.
#[derive(Debug, Default)]
pub struct VirtualScreen {
    rows: Vec<Vec<char>>,
    row: usize,
    col: usize,
    cursor_visible: bool,
}

impl VirtualScreen {
    pub fn replay(bytes: &[u8]) -> Self {
        let mut vt = VirtualScreen {
            cursor_visible: true,
            ..Default::default()
        };
        let text = String::from_utf8_lossy(bytes);
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\x1b' => {
                    if chars.next() != Some('[') {
                        continue;
                    }
                    let mut params = String::new();
                    let mut fin = None;
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            fin = Some(c);
                            break;
                        }
                        params.push(c);
                    }
                    if let Some(fin) = fin {
                        vt.apply_csi(&params, fin);
                    }
                }
                '\n' => {
                    vt.row += 1;
                    vt.col = 0;
                }
                '\r' => vt.col = 0,
                c => vt.put(c),
            }
        }
        vt
    }

    fn apply_csi(&mut self, params: &str, fin: char) {
        let count = || params.parse::<usize>().unwrap_or(1).max(1);
        match fin {
            'G' => self.col = 0,
            'A' => self.row = self.row.saturating_sub(count()),
            'B' => self.row += count(),
            'K' if params == "2" => {
                if let Some(r) = self.rows.get_mut(self.row) {
                    r.clear();
                }
            }
            'l' if params == "?25" => self.cursor_visible = false,
            'h' if params == "?25" => self.cursor_visible = true,
            _ => {}
        }
    }

    fn put(&mut self, c: char) {
        if self.rows.len() <= self.row {
            self.rows.resize_with(self.row + 1, Vec::new);
        }
        let r = &mut self.rows[self.row];
        if r.len() <= self.col {
            r.resize(self.col + 1, ' ');
        }
        r[self.col] = c;
        self.col += 1;
    }

    /// Row text with trailing blanks trimmed; rows never written read as "".
    pub fn line(&self, row: usize) -> String {
        self.rows
            .get(row)
            .map(|r| r.iter().collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    /// All rows up to the last one holding text, or up to the cursor.
    pub fn lines(&self) -> Vec<String> {
        let len = self.rows.len().max(self.row + 1);
        (0..len).map(|r| self.line(r)).collect()
    }

    pub fn cursor_row(&self) -> usize {
        self.row
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }
}
