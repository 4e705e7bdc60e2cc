//! Styxy CLI wrapper
//!
//! Async executor and error types for the external `styxy` command.

pub mod error;
pub mod executor;

pub use error::{CliError, CliResult};
pub use executor::StyxyCli;
