//! Rule file loader with hot-reload via `notify` watcher.
//!
//! Reads a JSON array of rule specifications, validates each entry and
//! keeps the last good rule set in memory. The watcher re-reads the file
//! on change; a malformed edit never replaces a working rule set.

mod core;
mod error;
mod watcher;


pub use self::core::{load_str, LoadOutcome, RuleLoader};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
