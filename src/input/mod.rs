pub mod auth_log;

pub use auth_log::{AuthLogParser, InputError};
