//! Redraw engine.
//!
//! The only code path that paints the reserved status rows. One dedicated
//! thread blocks on the one-slot wake channel, and each wake runs exactly one
//! pass. Wakes that arrive while a pass runs collapse into a single follow-up
//! pass, so redraw cost is bounded by pass duration rather than update rate.
//!
//! A pass, starting on the scrolling region's bottom line:
//! 1. hide the cursor,
//! 2. for each slot in order, advance one line and, only when its text differs
//!    from what was last rendered there, clear the row and write the text
//!    clipped to the terminal width,
//! 3. move back up over all slots to the start of the bottom line, show the
//!    cursor and re-echo the scrolling preview (if any).
//!
//! Lock order is screen, then table. The table lock is held only while the
//! changed rows are collected, so producers calling `update` never wait on
//! terminal I/O.

use crate::scroll::Screen;
use crate::slots::SlotTable;
use crate::writer::Writer;
use crate::{Shared, lock};
use core_events::{LINES_REPAINTED, REDRAW_PASSES, RedrawListener, RedrawNotifier, Wake};
use core_terminal::ansi::ResetAttributes;
use std::borrow::Cow;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub slots: usize,
    pub repainted: usize,
}

/// Clip to `columns` visible cells. Escape sequences pass through at zero
/// width, other control characters render as a single space. A clipped line
/// that carried escapes is closed with an attribute reset.
pub fn clip_to_columns(text: &str, columns: usize) -> Cow<'_, str> {
    let needs_work = text.chars().any(|c| c.is_control() && c != '\x1b');
    let mut out = String::with_capacity(text.len());
    let mut width = 0usize;
    let mut styled = false;
    let mut clipped = false;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            styled = true;
            out.push(ch);
            if let Some(next) = chars.next() {
                out.push(next);
                if next == '[' {
                    for c in chars.by_ref() {
                        out.push(c);
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
            }
            continue;
        }
        let ch = if ch.is_control() { ' ' } else { ch };
        let w = ch.width().unwrap_or(0);
        if width + w > columns {
            clipped = true;
            break;
        }
        width += w;
        out.push(ch);
    }
    if !clipped && !needs_work {
        return Cow::Borrowed(text);
    }
    if clipped && styled {
        out.push_str(&ResetAttributes.to_string());
    }
    Cow::Owned(out)
}

/// Run one pass against the given screen and table.
pub fn redraw_pass(screen: &Mutex<Screen>, table: &Mutex<SlotTable>) -> io::Result<PassStats> {
    let mut screen = lock(screen);
    if !screen.supports_protocol() {
        return Ok(PassStats::default());
    }
    let changes = lock(table).take_changes();
    let columns = screen.columns();

    let mut w = Writer::new();
    w.hide_cursor();
    let mut repainted = 0;
    for change in &changes {
        w.new_line();
        if let Some(text) = change {
            w.line_start();
            w.clear_line();
            w.print(clip_to_columns(text, columns).into_owned());
            repainted += 1;
        }
    }
    w.cursor_up(changes.len());
    w.line_start();
    w.show_cursor();
    if let Some((preview, markup)) = screen.preview() {
        w.print_marked(preview, markup);
    }
    screen.emit(w)?;

    REDRAW_PASSES.fetch_add(1, Ordering::Relaxed);
    LINES_REPAINTED.fetch_add(repainted as u64, Ordering::Relaxed);
    Ok(PassStats {
        slots: changes.len(),
        repainted,
    })
}

/// Owner of the background redraw thread.
#[derive(Debug)]
pub struct RedrawEngine {
    notifier: RedrawNotifier,
    handle: JoinHandle<()>,
}

impl RedrawEngine {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        notifier: RedrawNotifier,
        listener: RedrawListener,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("buildmux-redraw".into())
            .spawn(move || run(shared, listener))?;
        Ok(Self { notifier, handle })
    }

    /// Stop and join the thread. A panicked thread is logged and otherwise
    /// ignored; teardown must finish regardless.
    pub fn stop(self) {
        self.notifier.stop();
        match self.handle.join() {
            Ok(()) => debug!(target: "console.redraw", "redraw_thread_joined"),
            Err(_) => warn!(target: "console.redraw", "redraw_thread_panicked"),
        }
    }
}

fn run(shared: Arc<Shared>, listener: RedrawListener) {
    let span = tracing::debug_span!(target: "console.redraw", "redraw_thread");
    let _enter = span.enter();
    loop {
        if listener.wait() == Wake::Stop {
            break;
        }
        match redraw_pass(&shared.screen, &shared.table) {
            Ok(stats) => trace!(
                target: "console.redraw",
                slots = stats.slots,
                repainted = stats.repainted,
                "pass"
            ),
            Err(e) => warn!(target: "console.redraw", %e, "pass_write_failed"),
        }
    }
}
