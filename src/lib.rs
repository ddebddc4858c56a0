pub mod clienv;
pub mod display;
pub mod error;
pub mod ids;
pub mod lang;
pub mod privilege;
pub mod process;
pub mod reset;
pub mod storage;

pub use error::{Error, Result};
pub use ids::{IdGenerator, IdKind};
pub use process::{ProcessRecord, ProcessTerminator, StopOutcome, TerminatorConfig};
pub use reset::{build_identifiers, Reset, ResetOptions};
pub use storage::{ConfigDocument, ConfigStore, FileOwner, TelemetryIds};
