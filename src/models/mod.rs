pub mod event;

pub use event::{AuthEvent, AuthEventType, BruteForceAlert};
