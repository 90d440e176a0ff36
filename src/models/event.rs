use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of authentication failure recognised in sshd logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventType {
    /// "Failed password for [invalid user] <user> from <ip>"
    FailedPassword,
    /// "Invalid user <user> from <ip>"
    InvalidUser,
}

impl AuthEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventType::FailedPassword => "failed_password",
            AuthEventType::InvalidUser => "invalid_user",
        }
    }
}

impl fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "failed_password" => Ok(AuthEventType::FailedPassword),
            "invalid_user" => Ok(AuthEventType::InvalidUser),
            other => Err(format!(
                "unknown event type '{}' (expected failed_password or invalid_user)",
                other
            )),
        }
    }
}

/// A single authentication event extracted from one log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Local wall-clock time; the year comes from the parser's reference year
    pub timestamp: NaiveDateTime,
    pub event_type: AuthEventType,
    pub source_ip: Ipv4Addr,
    pub user: Option<String>,
    pub raw_line: String,
}

/// A burst of matching events from one source that crossed the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BruteForceAlert {
    pub source_ip: Ipv4Addr,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub count_in_window: usize,
    /// Threshold in force when the alert fired
    pub threshold: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_from_str() {
        assert_eq!(
            AuthEventType::from_str("failed_password").unwrap(),
            AuthEventType::FailedPassword
        );
        assert_eq!(
            AuthEventType::from_str("Invalid-User").unwrap(),
            AuthEventType::InvalidUser
        );
        assert!(AuthEventType::from_str("accepted").is_err());
    }

    #[test]
    fn test_event_type_serializes_snake_case() {
        let json = serde_json::to_string(&AuthEventType::FailedPassword).unwrap();
        assert_eq!(json, "\"failed_password\"");
        assert_eq!(AuthEventType::InvalidUser.to_string(), "invalid_user");
    }
}
