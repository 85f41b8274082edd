// Public modules
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod sync;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use engine::{Execution, ExecutionMode, Executor};
pub use error::{Error, ErrorCode, Result};
pub use pipeline::{
    Argument, CombinedCommand, Command, CommandBuilder, ContainerCommand, OutputTarget, Pipeline,
    RemoteCommand,
};
