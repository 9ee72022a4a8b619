//! Deletion of files reported infected.

use crate::core::error::Error;
use crate::core::types::{DeletionOutcome, DeletionReport};
use crate::scanner::progress::ScanEvent;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Reason recorded for a selected path that no scan reported.
const NOT_INFECTED_REASON: &str = "not reported infected";

/// Removes files from disk, one independent attempt per path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeletionCoordinator;

impl DeletionCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Delete every path in caller order. Duplicates are attempted once.
    pub fn delete_all<I, P>(&self, paths: I) -> DeletionReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if !seen.insert(path.to_path_buf()) {
                continue;
            }
            outcomes.push(self.delete_one(path));
        }

        let report = DeletionReport::new(outcomes);
        if !report.is_nothing_to_do() {
            log::info!(
                "Deletion finished: {} deleted, {} failed",
                report.summary.deleted_count,
                report.summary.failed_count
            );
        }
        report
    }

    /// Attempt a single deletion.
    pub fn delete_one(&self, path: &Path) -> DeletionOutcome {
        match fs::remove_file(path) {
            Ok(()) => {
                log::info!("Deleted {}", path.display());
                DeletionOutcome::deleted(path)
            }
            Err(e) => {
                let err = Error::file_delete(path, e);
                log::warn!("Failed to delete {}: {}", path.display(), err);
                DeletionOutcome::failed(path, err.reason())
            }
        }
    }
}

/// Infected paths known to the controller, in discovery order.
///
/// Built from `ThreatFound` events; entries leave the set once deleted.
#[derive(Debug, Default, Clone)]
pub struct InfectedSet {
    paths: Vec<PathBuf>,
}

impl InfectedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a threat from a scan event. Other events are ignored.
    pub fn apply(&mut self, event: &ScanEvent) {
        if let ScanEvent::ThreatFound { path, .. } = event {
            self.insert(path.clone());
        }
    }

    pub fn insert(&mut self, path: PathBuf) {
        if !self.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Forget every entry, e.g. when a new scan starts.
    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True when there is nothing left to delete.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete the selected members, in selection order.
    ///
    /// Selected paths that are not in the set are reported as failures and
    /// left untouched on disk.
    pub fn delete_selected<P: AsRef<Path>>(
        &mut self,
        coordinator: &DeletionCoordinator,
        selection: &[P],
    ) -> DeletionReport {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::new();

        for path in selection {
            let path = path.as_ref();
            if !seen.insert(path.to_path_buf()) {
                continue;
            }
            if self.contains(path) {
                outcomes.push(coordinator.delete_one(path));
            } else {
                outcomes.push(DeletionOutcome::failed(path, NOT_INFECTED_REASON));
            }
        }

        let report = DeletionReport::new(outcomes);
        self.forget_deleted(&report);
        report
    }

    /// Delete every member of the set.
    pub fn delete_all(&mut self, coordinator: &DeletionCoordinator) -> DeletionReport {
        let report = coordinator.delete_all(&self.paths);
        self.forget_deleted(&report);
        report
    }

    fn forget_deleted(&mut self, report: &DeletionReport) {
        let deleted: HashSet<&Path> = report.deleted_paths().collect();
        self.paths.retain(|p| !deleted.contains(p.as_path()));
    }
}
