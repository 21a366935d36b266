//! Console facade.
//!
//! `Console` is the explicit context object the process entry point creates
//! and lends to build actions. Cloning it is the "later caller" path: clones
//! share one instance and bump an atomic reference count. Dropping (or
//! `close`-ing) the last clone tears the terminal down: the redraw thread is
//! stopped and joined first, then the reserved rows are cleared and the cursor
//! is shown again.
//!
//! Setup on a capable terminal reserves `slot_count` rows by emitting that many
//! line feeds and moving back up over them, then requests an initial pass.
//!
//! Status handles and output writers hold only the shared state, not a
//! reference count. After teardown they stay valid but inert: updates and
//! releases are dropped, output goes straight to the sink.

use crate::output::ConsoleWriter;
use crate::redraw::RedrawEngine;
use crate::scroll::Screen;
use crate::slots::{LineId, LinePosition, SlotTable};
use crate::status_line::StatusLine;
use crate::writer::Writer;
use core_config::ConsoleConfig;
use core_events::{RedrawNotifier, redraw_channel, telemetry_snapshot};
use core_terminal::{Color, TerminalCapabilities};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Lock ignoring poison: a panicked producer must not take the display down
/// with it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by the facade, status handles, writers and the redraw thread.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) capabilities: TerminalCapabilities,
    pub(crate) screen: Mutex<Screen>,
    pub(crate) table: Mutex<SlotTable>,
    notifier: RedrawNotifier,
    open: AtomicBool,
}

impl Shared {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(&self, id: LineId) {
        if self.is_open() {
            lock(&self.table).acquire(id);
        }
    }

    pub(crate) fn release(&self, id: LineId) {
        if !self.is_open() {
            return;
        }
        let visible = lock(&self.table).release(id);
        if visible {
            self.notifier.request();
        }
    }

    pub(crate) fn update(&self, id: LineId, text: String) {
        if !self.is_open() {
            return;
        }
        let visible = lock(&self.table).update(id, text);
        if visible {
            self.notifier.request();
        }
    }

    pub(crate) fn position(&self, id: LineId) -> LinePosition {
        lock(&self.table).position(id)
    }

    pub(crate) fn text_of(&self, id: LineId) -> Option<String> {
        lock(&self.table).text_of(id).map(str::to_string)
    }

    /// Route ordinary output through the scrolling region.
    pub(crate) fn write_output(&self, bytes: &[u8], markup: Option<Color>) {
        let mut screen = lock(&self.screen);
        if !self.is_open() {
            if let Err(e) = screen.write_raw(bytes) {
                warn!(target: "console.scroll", %e, "write_after_close_failed");
            }
            return;
        }
        if let Err(e) = screen.write(bytes, markup) {
            warn!(target: "console.scroll", %e, "scroll_write_failed");
        }
        if screen.supports_protocol() {
            // The raw write may have scrolled over the reserved rows.
            lock(&self.table).invalidate_all();
            drop(screen);
            self.notifier.request();
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    refs: AtomicUsize,
    engine: Mutex<Option<RedrawEngine>>,
}

pub struct Console {
    inner: Arc<Inner>,
}

impl Console {
    /// Probe the real terminal and take over standard output.
    pub fn open(config: &ConsoleConfig) -> Self {
        let caps = TerminalCapabilities::detect_with_timeout(config.size_query_timeout());
        Self::with_sink(caps, config, std::io::stdout())
    }

    /// Open against explicit capabilities and sink.
    pub fn with_sink(
        capabilities: TerminalCapabilities,
        config: &ConsoleConfig,
        sink: impl Write + Send + 'static,
    ) -> Self {
        let protocol = capabilities.supports_control_protocol && !config.plain;
        let slot_count = if protocol {
            config.slot_count(capabilities.rows)
        } else {
            0
        };
        let (notifier, listener) = redraw_channel();
        let shared = Arc::new(Shared {
            capabilities,
            screen: Mutex::new(Screen::new(Box::new(sink), protocol, capabilities.columns)),
            table: Mutex::new(SlotTable::new(slot_count)),
            notifier: notifier.clone(),
            open: AtomicBool::new(true),
        });

        let mut engine = None;
        if protocol {
            let mut w = Writer::new();
            for _ in 0..slot_count {
                w.new_line();
            }
            w.cursor_up(slot_count);
            w.line_start();
            if let Err(e) = lock(&shared.screen).emit(w) {
                warn!(target: "console.open", %e, "reserve_rows_failed");
            }
            match RedrawEngine::spawn(shared.clone(), notifier.clone(), listener) {
                Ok(e) => engine = Some(e),
                Err(e) => warn!(target: "console.open", %e, "redraw_thread_spawn_failed"),
            }
            notifier.request();
        }

        info!(
            target: "console.open",
            protocol,
            rows = capabilities.rows,
            columns = capabilities.columns,
            slot_count,
            "console_opened"
        );

        Self {
            inner: Arc::new(Inner {
                shared,
                refs: AtomicUsize::new(1),
                engine: Mutex::new(engine),
            }),
        }
    }

    pub fn capabilities(&self) -> TerminalCapabilities {
        self.inner.shared.capabilities
    }

    /// Whether status rows are actually drawn.
    pub fn supports_protocol(&self) -> bool {
        lock(&self.inner.shared.screen).supports_protocol()
    }

    pub fn slot_count(&self) -> usize {
        lock(&self.inner.shared.table).len()
    }

    /// Number of lines currently waiting for a slot.
    pub fn queued_count(&self) -> usize {
        lock(&self.inner.shared.table).queued_len()
    }

    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Acquire a status line bound to a fresh identity.
    pub fn status_line(&self) -> StatusLine {
        StatusLine::acquire(self.inner.shared.clone())
    }

    /// Channel standing in for standard output.
    pub fn stdout(&self) -> ConsoleWriter {
        ConsoleWriter::new(self.inner.shared.clone(), None)
    }

    /// Channel standing in for standard error; lines are marked red.
    pub fn stderr(&self) -> ConsoleWriter {
        ConsoleWriter::new(self.inner.shared.clone(), Some(Color::Red))
    }

    /// Drop this reference; the last one restores the terminal.
    pub fn close(self) {
        drop(self);
    }

    fn teardown(&self) {
        let shared = &self.inner.shared;
        shared.open.store(false, Ordering::Release);
        let engine = lock(&self.inner.engine).take();
        if let Some(engine) = engine {
            engine.stop();
        }

        let mut screen = lock(&shared.screen);
        if screen.supports_protocol() {
            let slot_count = lock(&shared.table).len();
            let mut w = Writer::new();
            w.hide_cursor();
            screen.complete_preview(&mut w);
            for _ in 0..slot_count {
                w.new_line();
                w.clear_line();
            }
            w.cursor_up(slot_count);
            w.line_start();
            w.show_cursor();
            if let Err(e) = screen.emit(w) {
                warn!(target: "console.close", %e, "restore_failed");
            }
        }
        drop(screen);

        let t = telemetry_snapshot();
        debug!(
            target: "console.close",
            redraw_requests = t.redraw_requests,
            redraw_coalesced = t.redraw_coalesced,
            redraw_passes = t.redraw_passes,
            lines_repainted = t.lines_repainted,
            scroll_writes = t.scroll_writes,
            "console_closed"
        );
    }
}

impl Clone for Console {
    fn clone(&self) -> Self {
        self.inner.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if self.inner.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.teardown();
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("capabilities", &self.inner.shared.capabilities)
            .field("refs", &self.ref_count())
            .finish()
    }
}
