//! Rule engine used as the advanced detection backend.
//!
//! - Rule definition with meta, strings, and conditions
//! - Text, hex, wide and regex patterns over raw bytes
//! - Rule database loading from a directory of JSON files

pub mod engine;
pub mod rule;

pub use engine::RuleEngine;
pub use rule::{Condition, PatternType, Rule, RuleMatch, RuleMeta, StringPattern};
