pub mod config;
pub mod detection;
pub mod input;
pub mod models;
pub mod output;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use detection::BruteForceDetector;
pub use input::{AuthLogParser, InputError};
pub use models::{AuthEvent, AuthEventType, BruteForceAlert};
pub use output::{build_report, write_report, Report, ReportError};
