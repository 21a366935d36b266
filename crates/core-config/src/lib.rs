//! Configuration loading and parsing.
//!
//! Parses `buildmux.toml` (or an override path provided by the binary) and
//! extracts the `[console]` table:
//!
//! ```toml
//! [console]
//! plain = false
//! rows_per_slot = 3
//! size_query_timeout_ms = 500
//! ```
//!
//! Every field has a default, unknown fields are ignored, and a missing or
//! unparsable file yields the defaults so a bad config can never stop a build.
//! `rows_per_slot = 0` would reserve no sensible layout; it is replaced by the
//! default and the substitution is logged under the `config` target.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, io, path::PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_FILE_NAME: &str = "buildmux.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Force the degraded mode even on a capable terminal.
    #[serde(default)]
    pub plain: bool,
    /// Terminal rows per status slot; slot count is `rows / rows_per_slot`.
    #[serde(default = "ConsoleConfig::default_rows_per_slot")]
    pub rows_per_slot: u16,
    #[serde(default = "ConsoleConfig::default_size_query_timeout_ms")]
    pub size_query_timeout_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            plain: false,
            rows_per_slot: Self::default_rows_per_slot(),
            size_query_timeout_ms: Self::default_size_query_timeout_ms(),
        }
    }
}

impl ConsoleConfig {
    const fn default_rows_per_slot() -> u16 {
        3
    }
    const fn default_size_query_timeout_ms() -> u64 {
        500
    }

    /// Divisor actually used for sizing; never zero.
    pub fn effective_rows_per_slot(&self) -> u16 {
        if self.rows_per_slot == 0 {
            Self::default_rows_per_slot()
        } else {
            self.rows_per_slot
        }
    }

    /// `floor(rows / rows_per_slot)`.
    pub fn slot_count(&self, rows: u16) -> usize {
        (rows / self.effective_rows_per_slot()) as usize
    }

    pub fn size_query_timeout(&self) -> Duration {
        Duration::from_millis(self.size_query_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

impl Config {
    pub fn console(&self) -> &ConsoleConfig {
        &self.file.console
    }
}

/// Best-effort config path: working directory first, then the platform
/// config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("buildmux").join(CONFIG_FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(target: "config", path = %path.display(), "config_missing_using_defaults");
            return Ok(Config::default());
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), %e, "config_read_failed");
            return Ok(Config::default());
        }
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            if file.console.rows_per_slot == 0 {
                info!(
                    target: "config",
                    path = %path.display(),
                    effective = file.console.effective_rows_per_slot(),
                    "rows_per_slot_zero_replaced"
                );
            }
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.console(), &ConsoleConfig::default());
        assert_eq!(cfg.console().rows_per_slot, 3);
        assert_eq!(cfg.console().size_query_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_fallback_is_logged() {
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("DEBUG config:"));
        assert!(log_output.contains("config_missing_using_defaults"));
        assert_eq!(cfg.console(), &ConsoleConfig::default());
    }

    #[test]
    fn parses_console_table() {
        let tmp = write_config(
            "[console]\nplain = true\nrows_per_slot = 4\nsize_query_timeout_ms = 50\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.console().plain);
        assert_eq!(cfg.console().rows_per_slot, 4);
        assert_eq!(cfg.console().size_query_timeout(), Duration::from_millis(50));
        assert_eq!(cfg.console().slot_count(24), 6);
    }

    #[test]
    fn partial_table_keeps_remaining_defaults() {
        let tmp = write_config("[console]\nplain = true\n[unrelated]\nkey = 1\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.console().plain);
        assert_eq!(cfg.console().rows_per_slot, 3);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = write_config("[console\nplain = maybe");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.console(), &ConsoleConfig::default());
    }

    #[test]
    fn slot_count_floors_division() {
        let cfg = ConsoleConfig::default();
        assert_eq!(cfg.slot_count(24), 8);
        assert_eq!(cfg.slot_count(26), 8);
        assert_eq!(cfg.slot_count(2), 0);
    }

    #[test]
    fn zero_rows_per_slot_is_replaced_and_logged() {
        let tmp = write_config("[console]\nrows_per_slot = 0\n");
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            load_from(Some(tmp.path().to_path_buf())).unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("rows_per_slot_zero_replaced"));
        assert_eq!(cfg.console().effective_rows_per_slot(), 3);
        assert_eq!(cfg.console().slot_count(30), 10);
    }
}
