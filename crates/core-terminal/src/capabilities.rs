//! Terminal capability probing.
//!
//! Detection runs once when the console opens and yields an immutable
//! `TerminalCapabilities` value. Three checks must all pass before the
//! control protocol is enabled:
//! * standard output is an interactive terminal,
//! * the terminal type indicator (`TERM`) is set and is not `dumb`,
//! * the external size query (`stty size`) answers with exactly two positive
//!   integers `rows columns` before its timeout.
//!
//! Any failure collapses to `TerminalCapabilities::fallback()` (24x80, protocol
//! disabled). The failure reason is logged at debug level under
//! `terminal.probe` and never surfaces to the caller.
//!
//! Terminal resize after startup is not tracked; the layout is computed from a
//! single probe.

use crossterm::tty::IsTty;
use std::fs::File;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const FALLBACK_ROWS: u16 = 24;
pub const FALLBACK_COLUMNS: u16 = 80;
/// Terminal type value that advertises no cursor control at all.
pub const DEGRADED_TERM: &str = "dumb";
pub const DEFAULT_SIZE_QUERY_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    pub supports_control_protocol: bool,
    pub rows: u16,
    pub columns: u16,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("standard output is not an interactive terminal")]
    NotInteractive,
    #[error("terminal type is not set")]
    TermUnset,
    #[error("terminal type `{0}` has no control protocol")]
    DegradedTerm(String),
    #[error("size query could not run")]
    Io(#[from] std::io::Error),
    #[error("size query exited with {0}")]
    Exit(ExitStatus),
    #[error("size query timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed size query output {0:?}")]
    Malformed(String),
}

/// Source of the raw `rows columns` answer. Split out so tests can supply
/// canned output without a terminal attached.
pub trait SizeQuery {
    fn query(&self) -> Result<String, ProbeError>;
}

/// Runs `stty size` against the controlling terminal with a bounded wait.
#[derive(Debug, Clone, Copy)]
pub struct SttySizeQuery {
    timeout: Duration,
}

impl SttySizeQuery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SttySizeQuery {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_QUERY_TIMEOUT)
    }
}

impl SizeQuery for SttySizeQuery {
    fn query(&self) -> Result<String, ProbeError> {
        let tty = File::open("/dev/tty")?;
        let mut child = Command::new("stty")
            .arg("size")
            .stdin(Stdio::from(tty))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // The pipe is drained on a helper thread so the wait below can time out
        // without blocking on a wedged child.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("size query stdout not captured"))?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("buildmux-size-query".into())
            .spawn(move || {
                let mut out = String::new();
                let res = stdout.read_to_string(&mut out).map(|_| out);
                let _ = tx.send(res);
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(read) => {
                let out = read?;
                let status = child.wait()?;
                if status.success() {
                    Ok(out)
                } else {
                    Err(ProbeError::Exit(status))
                }
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ProbeError::Timeout(self.timeout))
            }
        }
    }
}

/// Parse `rows columns`. Anything other than two positive integers is rejected.
pub fn parse_size(output: &str) -> Result<(u16, u16), ProbeError> {
    let malformed = || ProbeError::Malformed(output.to_string());
    let mut tokens = output.split_whitespace();
    let (Some(rows), Some(cols), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(malformed());
    };
    let rows: u16 = rows.parse().map_err(|_| malformed())?;
    let cols: u16 = cols.parse().map_err(|_| malformed())?;
    if rows == 0 || cols == 0 {
        return Err(malformed());
    }
    Ok((rows, cols))
}

impl TerminalCapabilities {
    /// Static answer used whenever detection fails.
    pub const fn fallback() -> Self {
        Self {
            supports_control_protocol: false,
            rows: FALLBACK_ROWS,
            columns: FALLBACK_COLUMNS,
        }
    }

    /// Capabilities of a known-good interactive terminal of the given size.
    pub const fn interactive(rows: u16, columns: u16) -> Self {
        Self {
            supports_control_protocol: true,
            rows,
            columns,
        }
    }

    /// Probe the real process environment.
    pub fn detect() -> Self {
        Self::detect_with_timeout(DEFAULT_SIZE_QUERY_TIMEOUT)
    }

    pub fn detect_with_timeout(timeout: Duration) -> Self {
        let interactive = std::io::stdout().is_tty();
        let term = std::env::var("TERM").ok();
        Self::probe(interactive, term.as_deref(), &SttySizeQuery::new(timeout))
    }

    /// Probe against explicit inputs. Never fails; see module docs.
    pub fn probe(interactive: bool, term: Option<&str>, size: &dyn SizeQuery) -> Self {
        match Self::try_probe(interactive, term, size) {
            Ok(caps) => {
                debug!(
                    target: "terminal.probe",
                    rows = caps.rows,
                    columns = caps.columns,
                    "control_protocol_enabled"
                );
                caps
            }
            Err(err) => {
                debug!(target: "terminal.probe", %err, "capability_fallback");
                Self::fallback()
            }
        }
    }

    fn try_probe(
        interactive: bool,
        term: Option<&str>,
        size: &dyn SizeQuery,
    ) -> Result<Self, ProbeError> {
        if !interactive {
            return Err(ProbeError::NotInteractive);
        }
        match term {
            None | Some("") => return Err(ProbeError::TermUnset),
            Some(t) if t == DEGRADED_TERM => return Err(ProbeError::DegradedTerm(t.to_string())),
            Some(_) => {}
        }
        let (rows, columns) = parse_size(&size.query()?)?;
        Ok(Self::interactive(rows, columns))
    }
}
