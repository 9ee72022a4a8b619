//! Removal of infected files after a scan.

pub mod deletion;

pub use deletion::{DeletionCoordinator, InfectedSet};
