use core_console::testing::{CaptureSink, VirtualScreen};
use core_console::{Color, Console, ConsoleConfig, LinePosition, TerminalCapabilities, status};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

fn capable(rows: u16, columns: u16) -> (Console, CaptureSink) {
    let sink = CaptureSink::new();
    let console = Console::with_sink(
        TerminalCapabilities::interactive(rows, columns),
        &ConsoleConfig::default(),
        sink.clone(),
    );
    (console, sink)
}

fn degraded() -> (Console, CaptureSink) {
    let sink = CaptureSink::new();
    let console = Console::with_sink(
        TerminalCapabilities::fallback(),
        &ConsoleConfig::default(),
        sink.clone(),
    );
    (console, sink)
}

/// Block until a redraw pass has put `needle` on the sink.
fn wait_for(sink: &CaptureSink, needle: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !sink.contents().contains(needle) {
        assert!(Instant::now() < deadline, "timed out waiting for {needle:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn slot_index(position: LinePosition) -> usize {
    match position {
        LinePosition::Slot(i) => i,
        other => panic!("expected a slot, got {other:?}"),
    }
}

#[test]
fn degraded_run_passes_output_through_verbatim() {
    let (console, sink) = degraded();
    assert!(!console.supports_protocol());
    assert_eq!(console.slot_count(), 0);

    let line = console.status_line();
    status!(line, "compiling {}", "core");
    writeln!(console.stdout(), "hello from the build").unwrap();
    writeln!(console.stderr(), "warning: unused import").unwrap();
    line.close();
    console.close();

    let out = sink.contents();
    assert_eq!(out, "hello from the build\nwarning: unused import\n");
    assert!(!out.contains('\u{1b}'));
}

#[test]
fn plain_config_disables_the_protocol_on_a_capable_terminal() {
    let sink = CaptureSink::new();
    let config = ConsoleConfig {
        plain: true,
        ..ConsoleConfig::default()
    };
    let console = Console::with_sink(TerminalCapabilities::interactive(24, 80), &config, sink.clone());
    assert!(!console.supports_protocol());
    assert_eq!(console.slot_count(), 0);
    write!(console.stdout(), "raw").unwrap();
    console.close();
    assert_eq!(sink.contents(), "raw");
}

#[test]
fn slot_count_follows_terminal_rows() {
    let (console, _sink) = capable(24, 80);
    assert!(console.supports_protocol());
    assert_eq!(console.slot_count(), 8);
    let (small, _sink) = capable(2, 80);
    assert_eq!(small.slot_count(), 0);
}

#[test]
fn clones_share_one_instance_and_last_close_restores() {
    let (console, sink) = capable(12, 40);
    let other = console.clone();
    assert_eq!(console.ref_count(), 2);
    other.close();
    assert_eq!(console.ref_count(), 1);

    // Still live after the first close.
    let line = console.status_line();
    line.update("still drawing");
    console.close();

    let out = sink.contents();
    assert!(out.contains("still drawing"));
    assert!(out.ends_with("\u{1b}[?25h"));
}

#[test]
fn producers_within_capacity_get_distinct_slots() {
    let (console, _sink) = capable(24, 80);
    let mut lines: Vec<_> = (0..8).map(|_| console.status_line()).collect();
    for (i, line) in lines.iter().enumerate() {
        line.update(format!("job {i}"));
    }
    let mut slots: Vec<usize> = lines.iter().map(|l| slot_index(l.position())).collect();
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), 8);
    assert_eq!(console.queued_count(), 0);

    lines.remove(3).close();
    let bound = lines
        .iter()
        .filter(|l| matches!(l.position(), LinePosition::Slot(_)))
        .count();
    assert_eq!(bound, 7);

    let late = console.status_line();
    assert!(matches!(late.position(), LinePosition::Slot(_)));
}

#[test]
fn overflow_lines_wait_and_promote_oldest_first() {
    let (console, _sink) = capable(12, 80);
    assert_eq!(console.slot_count(), 4);

    let lines: Vec<_> = (0..7).map(|_| console.status_line()).collect();
    assert_eq!(console.queued_count(), 3);
    for (q, line) in lines[4..].iter().enumerate() {
        assert_eq!(line.position(), LinePosition::Queued(q));
    }

    // Queued lines keep their latest text while waiting.
    lines[4].update("waiting for a slot");

    let mut lines = lines;
    let freed = lines.remove(1);
    freed.close();

    assert_eq!(console.queued_count(), 2);
    assert_eq!(lines[3].position(), LinePosition::Slot(3));
    assert_eq!(lines[3].text().as_deref(), Some("waiting for a slot"));
    assert_eq!(lines[4].position(), LinePosition::Queued(0));
    assert_eq!(lines[5].position(), LinePosition::Queued(1));
}

#[test]
fn only_bound_lines_are_painted_until_promoted() {
    let (console, sink) = capable(12, 80);
    let mut lines: Vec<_> = (0..7).map(|_| console.status_line()).collect();
    for (i, line) in lines.iter().enumerate() {
        line.update(format!("job {i}"));
    }

    wait_for(&sink, "job 3");
    let vt = VirtualScreen::replay(&sink.bytes());
    assert_eq!(vt.lines(), vec!["", "job 0", "job 1", "job 2", "job 3"]);
    assert_eq!(vt.cursor_row(), 0);
    let painted = sink.contents();
    for queued in 4..7 {
        assert!(!painted.contains(&format!("job {queued}")));
    }

    lines.remove(0).close();
    wait_for(&sink, "job 4");
    let vt = VirtualScreen::replay(&sink.bytes());
    assert_eq!(vt.lines(), vec!["", "job 1", "job 2", "job 3", "job 4"]);
    let painted = sink.contents();
    assert!(!painted.contains("job 5"));
    assert!(!painted.contains("job 6"));
}

#[test]
fn releasing_twice_leaves_other_lines_alone() {
    let (console, _sink) = capable(12, 80);
    let mut a = console.status_line();
    let b = console.status_line();
    b.update("linking");
    let before = b.position();

    a.release();
    a.release();
    a.update("ignored after release");

    assert_eq!(a.position(), LinePosition::Absent);
    assert_eq!(b.position(), before);
    assert_eq!(b.text().as_deref(), Some("linking"));
}

#[test]
fn handles_are_inert_after_close() {
    let (console, sink) = capable(12, 80);
    let line = console.status_line();
    line.update("before close");
    let mut out = console.stdout();
    console.close();

    line.update("late update");
    assert_eq!(line.text().as_deref(), Some("before close"));
    drop(line);

    writeln!(out, "after close").unwrap();
    let contents = sink.contents();
    assert!(!contents.contains("late update"));
    assert!(contents.ends_with("after close\n"));
}

#[test]
fn updates_before_close_are_rendered() {
    let (console, sink) = capable(12, 80);
    let line = console.status_line();
    let worker = thread::spawn(move || {
        for i in 0..1000 {
            status!(line, "step {i}");
        }
        line
    });
    let line = worker.join().unwrap();
    assert_eq!(line.text().as_deref(), Some("step 999"));
    console.close();
    assert!(sink.contents().contains("step 999"));
}

#[test]
fn scrolled_output_stays_above_and_region_is_cleared_on_close() {
    let (console, sink) = capable(6, 40);
    assert_eq!(console.slot_count(), 2);
    let a = console.status_line();
    let b = console.status_line();
    a.update("building alpha");
    b.update("building beta");
    let mut out = console.stdout();
    writeln!(out, "log one").unwrap();
    writeln!(out, "log two").unwrap();
    console.close();

    let bytes = sink.bytes();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("building alpha"));
    assert!(text.contains("building beta"));

    let vt = VirtualScreen::replay(&bytes);
    assert_eq!(vt.line(0), "log one");
    assert_eq!(vt.line(1), "log two");
    assert!(vt.lines()[2..].iter().all(String::is_empty));
    assert_eq!(vt.cursor_row(), 2);
    assert!(vt.cursor_visible());
}

#[test]
fn unterminated_output_is_completed_on_close() {
    let (console, sink) = capable(9, 40);
    let line = console.status_line();
    line.update("testing");
    write!(console.stdout(), "partial").unwrap();
    console.close();

    let vt = VirtualScreen::replay(&sink.bytes());
    assert_eq!(vt.line(0), "partial");
    assert_eq!(vt.cursor_row(), 1);
    assert!(vt.lines()[1..].iter().all(String::is_empty));
}

#[test]
fn stderr_lines_are_marked_red() {
    let (console, sink) = capable(9, 40);
    writeln!(console.stderr(), "boom").unwrap();
    console.close();
    assert!(sink.contents().contains("\u{1b}[31mboom\u{1b}[0m"));
}

#[test]
fn colored_update_wraps_text_in_palette_codes() {
    let (console, _sink) = capable(9, 40);
    let line = console.status_line();
    line.update_colored(Color::Green, "ok");
    assert_eq!(line.text().as_deref(), Some("\u{1b}[32mok\u{1b}[0m"));
}

#[test]
fn status_macro_formats_arguments() {
    let (console, _sink) = degraded();
    let line = console.status_line();
    status!(line, "{}/{} {}", 1, 3, "core");
    assert_eq!(line.text().as_deref(), Some("1/3 core"));
}

#[test]
fn status_line_writer_shows_last_complete_line() {
    let (console, _sink) = capable(9, 40);
    let line = console.status_line();
    {
        let mut w = line.writer();
        write!(w, "step 1\nstep 2\r\nste").unwrap();
        assert_eq!(line.text().as_deref(), Some("step 2"));
        w.flush().unwrap();
        assert_eq!(line.text().as_deref(), Some("ste"));
        write!(w, "p 3").unwrap();
    }
    assert_eq!(line.text().as_deref(), Some("p 3"));
}

#[test]
fn tracing_logs_through_a_console_writer() {
    let (console, sink) = degraded();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(console.stdout())
        .with_ansi(false)
        .without_time()
        .with_target(true)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "build", "compiled crate");
    });
    console.close();
    assert!(sink.contents().contains("INFO build: compiled crate"));
}
