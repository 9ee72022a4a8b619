//! Scan orchestration: runs the per-file classification loop and reports
//! events to the controller.

use crate::core::error::{Error, Result};
use crate::core::types::{Detection, ScanResult, ScanRun, Verdict};
use crate::detection::ScanEngine;
use crate::scanner::progress::ScanEvent;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default capacity of the worker -> controller channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Cooperative cancellation flag shared between controller and worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the in-flight flag when the worker exits, even on panic.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives one scan at a time over a fixed engine.
pub struct ScanOrchestrator {
    engine: Arc<dyn ScanEngine>,
    event_buffer: usize,
    active: Arc<AtomicBool>,
}

impl ScanOrchestrator {
    pub fn new(engine: Arc<dyn ScanEngine>) -> Self {
        Self {
            engine,
            event_buffer: DEFAULT_EVENT_BUFFER,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the event channel capacity (minimum 1).
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn engine(&self) -> &dyn ScanEngine {
        self.engine.as_ref()
    }

    /// Whether a spawned scan is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Classify `files` in order on the calling thread.
    ///
    /// Cancellation is checked before each file. `ScanComplete` is always
    /// the last event emitted.
    pub fn run<F>(&self, files: &[PathBuf], cancel: &CancelToken, emit: F) -> ScanRun
    where
        F: FnMut(ScanEvent),
    {
        run_loop(self.engine.as_ref(), files, cancel, emit)
    }

    /// Run the scan loop on a blocking worker and stream its events.
    pub fn spawn(&self, files: Vec<PathBuf>) -> Result<ScanHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::ScanInProgress);
        }

        let guard = ActiveGuard(Arc::clone(&self.active));
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let cancel = CancelToken::new();
        let engine = Arc::clone(&self.engine);
        let token = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            run_loop(engine.as_ref(), &files, &token, |event| {
                // Controller gone; keep scanning so the run still completes.
                let _ = tx.blocking_send(event);
            })
        });

        Ok(ScanHandle {
            events: rx,
            cancel,
            task,
        })
    }
}

/// Controller side of a spawned scan.
pub struct ScanHandle {
    events: mpsc::Receiver<ScanEvent>,
    cancel: CancelToken,
    task: JoinHandle<ScanRun>,
}

impl ScanHandle {
    /// Next event, or `None` once the worker has finished and the channel
    /// is drained.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    /// Ask the worker to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the worker and return the run. Undelivered events are dropped.
    pub async fn finish(self) -> Result<ScanRun> {
        let ScanHandle { events, task, .. } = self;
        drop(events);
        task.await
            .map_err(|e| Error::ScanWorker(e.to_string()))
    }
}

/// Produce the verdict for one target. Unreadable files count as clean.
fn classify_target(engine: &dyn ScanEngine, path: &Path, run: &mut ScanRun) -> ScanResult {
    let verdict = engine.scan_file(path).unwrap_or_else(|e| {
        log::debug!("Treating {} as clean: {}", path.display(), e);
        run.errors += 1;
        Verdict::Clean
    });
    run.scanned_count += 1;
    ScanResult::new(path, verdict)
}

fn run_loop<F>(
    engine: &dyn ScanEngine,
    files: &[PathBuf],
    cancel: &CancelToken,
    mut emit: F,
) -> ScanRun
where
    F: FnMut(ScanEvent),
{
    let total = files.len() as u64;
    let mut run = ScanRun::new(total, engine.name());
    let mut cancelled = false;

    log::info!("Scanning {} files with {} engine", total, engine.name());

    for (i, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            log::info!("Scan cancelled after {} of {} files", run.scanned_count, total);
            cancelled = true;
            break;
        }

        let result = classify_target(engine, path, &mut run);
        emit(ScanEvent::Progress {
            current: i as u64 + 1,
            total,
        });

        if let Verdict::Infected(threat_name) = result.verdict {
            log::info!("Threat detected: {} in {}", threat_name, result.path.display());
            run.detections.push(Detection::new(result.path.clone(), threat_name.clone()));
            emit(ScanEvent::ThreatFound {
                path: result.path,
                threat_name,
            });
        }
    }

    run.finish(cancelled);
    emit(ScanEvent::ScanComplete {
        scanned_count: run.scanned_count,
        infected_count: run.infected_count(),
        cancelled,
    });

    log::info!(
        "Scan finished: {} files scanned, {} threats found, {} errors",
        run.scanned_count,
        run.infected_count(),
        run.errors
    );

    run
}
