//! Protocol transcript logging
//!
//! Both roles append one timestamped record per control-channel line to a
//! user-supplied log file, mirroring what was sent and received. This is the
//! logging collaborator of the protocol engine and is deliberately dumb: a
//! write failure is reported through `log::warn!` and never aborts the
//! exchange that triggered it.
//!
//! Diagnostics (`log` + `env_logger`) are a separate concern and stay on
//! stderr.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::warn;

/// Cheap to clone; all clones append to the same file.
#[derive(Clone)]
pub struct TranscriptLogger {
    file: Option<Arc<Mutex<File>>>,
}

impl TranscriptLogger {
    /// Opens (or creates) the transcript file in append mode.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// A logger that drops every record; used by tests and when no log
    /// destination was given.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn sent(&self, line: &str) {
        self.record(format_args!("Sent: {line}"));
    }

    pub fn received(&self, line: &str) {
        self.record(format_args!("Received: {line}"));
    }

    pub fn connecting(&self, host: &str) {
        self.record(format_args!("Connecting to {host}"));
    }

    pub fn server_started(&self, addr: impl Display) {
        self.record(format_args!("Server listening at {addr}"));
    }

    pub fn error(&self, message: &str) {
        self.record(format_args!("ERROR {message}"));
    }

    pub fn quit(&self) {
        self.record(format_args!("Client quit, connection closed"));
    }

    fn record(&self, entry: std::fmt::Arguments<'_>) {
        let Some(file) = &self.file else { return };
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{timestamp} {entry}") {
                    warn!("transcript write failed: {e}");
                }
            }
            Err(_) => warn!("transcript lock poisoned; record dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn temp_log_path() -> std::path::PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        std::env::temp_dir().join(format!(
            "ferroftp-log-{}-{}.txt",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ))
    }

    #[test]
    fn appends_timestamped_records() {
        let path = temp_log_path();
        let logger = TranscriptLogger::open(&path).unwrap();
        logger.sent("USER alice");
        logger.received("331 Please specify the password.");
        logger.quit();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("Sent: USER alice"));
        assert!(lines[1].contains("Received: 331"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn disabled_logger_is_silent() {
        let logger = TranscriptLogger::disabled();
        logger.sent("QUIT");
        logger.error("nothing happens");
    }
}
