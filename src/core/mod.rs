pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use error::{Result, TickwireError};
pub use types::{GeneratorId, Tick};
