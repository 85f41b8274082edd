//! Pipeline execution engine.
//!
//! - `executor` - runs a composed pipeline as one shell process per pipe
//!   stage, captured, interactive or redirected to a file
//!
//! Builders in `pipeline` never spawn anything themselves; they hand their
//! rendered form to an `Executor`.

pub mod executor;

pub use executor::{decode_status, Execution, ExecutionMode, Executor};
