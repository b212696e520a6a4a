//! # Rekindle Core
//!
//! Shared foundation for the Rekindle bot: configuration, the error
//! taxonomy, the participant data model, and the courier seam the warmup
//! dispatcher sends through.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{Messages, RekindleConfig, StageConfig, WarmupConfig};
pub use error::{RekindleError, Result, SendError, SendResult};
pub use traits::Courier;
pub use types::{UserMeta, UserRecord, UserStats};
