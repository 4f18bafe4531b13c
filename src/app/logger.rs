use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

use crate::{Error, Result};

pub const LOG_LEVEL_ENV: &str = "LUXMETER_LOG_LEVEL";
pub const LOG_PATH_ENV: &str = "LUXMETER_LOG_PATH";

/// Stderr logger with an optional append-only file sink.
pub struct Logger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(level: LevelFilter, file_path: Option<PathBuf>) -> Self {
        let file = file_path.and_then(|p| {
            match OpenOptions::new().create(true).append(true).open(&p) {
                Ok(file) => Some(Mutex::new(file)),
                Err(err) => {
                    eprintln!("cannot open log file {}: {err}", p.display());
                    None
                }
            }
        });
        Self { level, file }
    }

    /// Like [`Logger::new`], but `LUXMETER_LOG_LEVEL` wins over `level` and
    /// `LUXMETER_LOG_PATH` is used when no file was given.
    pub fn with_env_overrides(level: LevelFilter, file_path: Option<PathBuf>) -> Self {
        let env_level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|s| s.parse::<LevelFilter>().ok());
        let env_file = std::env::var_os(LOG_PATH_ENV).map(PathBuf::from);
        Self::new(env_level.unwrap_or(level), file_path.or(env_file))
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Install as the global `log` backend.
    pub fn init(self) -> Result<()> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))
            .map_err(|e| Error::InvalidArgs(format!("logger already installed: {e}")))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        eprintln!("{line}");
        if let Some(file) = self.file.as_ref() {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.as_ref() {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

fn format_line(record: &Record) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "[{}.{:03}] [{}] {}: {}",
        ts.as_secs(),
        ts.subsec_millis(),
        record.level(),
        record.target(),
        record.args()
    )
}
