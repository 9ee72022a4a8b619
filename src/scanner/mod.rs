//! Directory scanning.
//!
//! - Recursive file enumeration
//! - The per-file classification loop and its worker task
//! - Scan events and console progress reporting

pub mod orchestrator;
pub mod progress;
pub mod walker;

pub use orchestrator::{CancelToken, ScanHandle, ScanOrchestrator};
pub use progress::{ConsoleProgressReporter, ScanEvent};
pub use walker::{walk, TreeWalker};
