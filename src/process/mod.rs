//! Discovery and termination of the target application's processes.
//!
//! ```text
//! ProcessTerminator ──► ProcessSource (tasklist / ps, taskkill / kill)
//!        │
//!        └── Pattern (wildcard match on the command column)
//! ```
//!
//! Each discovery pass recomputes its [`ProcessRecord`]s; nothing is cached
//! between attempts.

pub mod pattern;
pub mod source;
pub mod terminator;

pub use pattern::{matches_pattern, Pattern};
pub use source::{Platform, ProcessRecord, ProcessSource, SystemProcessSource};
pub use terminator::{ProcessTerminator, StopOutcome, TerminatorConfig};
