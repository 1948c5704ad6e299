pub mod analysis;
pub mod config;
pub mod error;
pub mod records;
pub mod state;
pub mod stats;

pub use analysis::*;
pub use config::{AppConfig, LlmProvider};
pub use error::SentimentError;
pub use records::*;
pub use state::*;
pub use stats::*;

/// Target language used when a caller does not pick one.
pub const DEFAULT_LANG: &str = "pt";
