//! Core type definitions used throughout nehnes-av.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Classification outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "verdict", content = "threat_name")]
pub enum Verdict {
    /// No known threat found
    Clean,
    /// Infected with the named threat
    Infected(String),
}

impl Verdict {
    /// Threat name if infected.
    pub fn threat_name(&self) -> Option<&str> {
        match self {
            Verdict::Clean => None,
            Verdict::Infected(name) => Some(name.as_str()),
        }
    }

    pub fn is_infected(&self) -> bool {
        matches!(self, Verdict::Infected(_))
    }
}

impl From<Option<String>> for Verdict {
    fn from(name: Option<String>) -> Self {
        match name {
            Some(name) => Verdict::Infected(name),
            None => Verdict::Clean,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Clean => write!(f, "clean"),
            Verdict::Infected(name) => write!(f, "infected ({})", name),
        }
    }
}

/// Verdict for a single scan target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Absolute path of the scanned file
    pub path: PathBuf,
    /// Classification outcome
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl ScanResult {
    pub fn new(path: impl Into<PathBuf>, verdict: Verdict) -> Self {
        Self {
            path: path.into(),
            verdict,
        }
    }
}

/// A detected threat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Path to the detected file
    pub path: PathBuf,
    /// Name of the detected threat
    pub threat_name: String,
}

impl Detection {
    pub fn new(path: impl Into<PathBuf>, threat_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            threat_name: threat_name.into(),
        }
    }
}

/// Final status of a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Every file was visited
    Completed,
    /// Stopped early on request
    Cancelled,
    /// The file sequence was empty
    NothingToScan,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Completed => write!(f, "Completed"),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
            ScanStatus::NothingToScan => write!(f, "Nothing to scan"),
        }
    }
}

/// Aggregate state of one directory scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    /// Unique scan identifier
    pub scan_id: String,
    /// Name of the engine variant used for the whole run
    pub engine: String,
    /// When the scan started
    pub started_at: DateTime<Utc>,
    /// When the scan ended
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of files handed to the run
    pub total_files: u64,
    /// Number of files classified
    pub scanned_count: u64,
    /// Files whose classification failed and were treated as clean
    pub errors: u64,
    /// Whether the run stopped on a cancellation request
    pub cancelled: bool,
    /// Threats in file-sequence order
    pub detections: Vec<Detection>,
}

impl ScanRun {
    /// Create a new run for `total_files` targets.
    pub fn new(total_files: u64, engine: impl Into<String>) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            engine: engine.into(),
            started_at: Utc::now(),
            finished_at: None,
            total_files,
            scanned_count: 0,
            errors: 0,
            cancelled: false,
            detections: Vec::new(),
        }
    }

    /// Infected paths in the order they were found.
    pub fn infected_paths(&self) -> Vec<PathBuf> {
        self.detections.iter().map(|d| d.path.clone()).collect()
    }

    pub fn infected_count(&self) -> u64 {
        self.detections.len() as u64
    }

    /// Whether a path was reported infected in this run.
    pub fn is_infected(&self, path: &Path) -> bool {
        self.detections.iter().any(|d| d.path == path)
    }

    /// Derived final status.
    pub fn status(&self) -> ScanStatus {
        if self.cancelled {
            ScanStatus::Cancelled
        } else if self.total_files == 0 {
            ScanStatus::NothingToScan
        } else {
            ScanStatus::Completed
        }
    }

    /// Mark the run finished.
    pub fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Calculate scan duration in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Result of one requested deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    /// Requested path
    pub path: PathBuf,
    /// Whether the file is gone because of this request
    pub deleted: bool,
    /// Why the deletion failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DeletionOutcome {
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            deleted: true,
            reason: None,
        }
    }

    pub fn failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            deleted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Counts for a deletion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub deleted_count: u64,
    pub failed_count: u64,
}

impl DeletionSummary {
    /// Build the summary for a list of outcomes.
    pub fn from_outcomes(outcomes: &[DeletionOutcome]) -> Self {
        let deleted_count = outcomes.iter().filter(|o| o.deleted).count() as u64;
        Self {
            deleted_count,
            failed_count: outcomes.len() as u64 - deleted_count,
        }
    }

    pub fn total(&self) -> u64 {
        self.deleted_count + self.failed_count
    }
}

/// Outcomes and summary for a deletion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    /// One entry per distinct requested path, in request order
    pub outcomes: Vec<DeletionOutcome>,
    pub summary: DeletionSummary,
}

impl DeletionReport {
    pub fn new(outcomes: Vec<DeletionOutcome>) -> Self {
        let summary = DeletionSummary::from_outcomes(&outcomes);
        Self { outcomes, summary }
    }

    /// True when nothing was requested.
    pub fn is_nothing_to_do(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Paths that were actually removed.
    pub fn deleted_paths(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(|o| o.deleted)
            .map(|o| o.path.as_path())
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| !o.deleted)
    }
}
