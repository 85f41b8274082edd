//! Generic utility primitives with zero domain knowledge.
//!
//! - `io` - File I/O with consistent error handling
//! - `shell` - Shell escaping and quoting
//! - `template` - Positional `%s` argument templates

pub mod io;
pub mod shell;
pub mod template;
