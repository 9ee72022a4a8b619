//! NEHNES: a signature-based malware scanner for directory trees
//!
//! This crate walks a directory tree, classifies every file against byte
//! signatures (or an optional rule engine), streams progress and detections
//! to a controller, and deletes infected files on request.

pub mod core;
pub mod detection;
pub mod remediation;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
