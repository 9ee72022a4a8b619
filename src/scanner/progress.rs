//! Scan events and console progress reporting.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Notification sent from a running scan to its controller.
///
/// Per scan: one `Progress` per examined file in order, each possibly
/// followed by `ThreatFound`, then exactly one `ScanComplete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// File `current` of `total` (1-based) has been examined
    Progress { current: u64, total: u64 },
    /// The file just examined is infected
    ThreatFound { path: PathBuf, threat_name: String },
    /// Terminal event
    ScanComplete {
        scanned_count: u64,
        infected_count: u64,
        cancelled: bool,
    },
}

impl ScanEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanEvent::ScanComplete { .. })
    }
}

/// Console progress reporter.
pub struct ConsoleProgressReporter {
    last_line_length: AtomicUsize,
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgressReporter {
    /// Create a new console reporter.
    pub fn new() -> Self {
        Self {
            last_line_length: AtomicUsize::new(0),
        }
    }

    /// Render one event to stderr.
    pub fn report(&self, event: &ScanEvent) {
        match event {
            ScanEvent::Progress { current, total } => {
                let pct = if *total > 0 {
                    (*current as f64 / *total as f64) * 100.0
                } else {
                    100.0
                };
                self.rewrite_line(format!(
                    "\r[Scanning] {:.1}% | Files: {}/{}",
                    pct, current, total
                ));
            }
            ScanEvent::ThreatFound { path, threat_name } => {
                self.clear_line();
                eprintln!("  [!] Found: {} - {}", threat_name, path.display());
            }
            ScanEvent::ScanComplete {
                scanned_count,
                infected_count,
                cancelled,
            } => {
                let status = if *cancelled { "Cancelled" } else { "Complete" };
                self.rewrite_line(format!(
                    "\r[{}] Files: {} | Threats: {}",
                    status, scanned_count, infected_count
                ));
                eprintln!();
                self.last_line_length.store(0, Ordering::Relaxed);
            }
        }
    }

    /// Report a non-fatal message without tearing the progress line.
    pub fn notice(&self, message: &str) {
        self.clear_line();
        eprintln!("{}", message);
    }

    fn rewrite_line(&self, message: String) {
        // Clear previous line and print new one
        let last_len = self.last_line_length.load(Ordering::Relaxed);
        let padding = if message.len() < last_len {
            " ".repeat(last_len - message.len())
        } else {
            String::new()
        };

        eprint!("{}{}", message, padding);
        self.last_line_length.store(message.len(), Ordering::Relaxed);
    }

    fn clear_line(&self) {
        let last_len = self.last_line_length.swap(0, Ordering::Relaxed);
        if last_len > 0 {
            eprint!("\r{}\r", " ".repeat(last_len));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ScanEvent::ThreatFound {
            path: PathBuf::from("/tmp/b.bin"),
            threat_name: "EICAR-Test".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "threat_found");
        assert_eq!(json["threat_name"], "EICAR-Test");

        let json = serde_json::to_value(ScanEvent::Progress { current: 1, total: 2 }).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["total"], 2);
    }

    #[test]
    fn test_is_complete() {
        assert!(ScanEvent::ScanComplete {
            scanned_count: 0,
            infected_count: 0,
            cancelled: false,
        }
        .is_complete());
        assert!(!ScanEvent::Progress { current: 1, total: 1 }.is_complete());
    }
}
