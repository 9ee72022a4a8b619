//! User interface components.

pub mod cli;

pub use cli::{Cli, Commands, ConfigAction, OutputFormat};
