//! Malware detection engines.
//!
//! - Byte-pattern signatures and the built-in store
//! - Basic substring engine and the advanced rule-engine adapter
//! - One-time engine selection with fallback advisories

pub mod engine;
pub mod rules;
pub mod signature;

pub use engine::{
    Advisory, AdvancedEngine, BasicEngine, EngineSelection, ExternalEngine, ScanEngine,
};
pub use rules::RuleEngine;
pub use signature::{Signature, SignatureStore, EICAR_NAME, EICAR_STRING};
