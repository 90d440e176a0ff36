//! sshd auth log parser
//!
//! Recognises two line shapes, checked in order:
//!
//! ```text
//! Jan 28 12:34:56 host sshd[123]: Failed password for invalid user admin from 1.2.3.4 port 12345 ssh2
//! Jan 28 12:35:01 host sshd[123]: Invalid user test from 9.9.9.9 port 1234
//! ```
//!
//! Syslog stamps carry no year or timezone. The parser combines them with an
//! explicit reference year and produces naive local timestamps, so a December
//! log processed in January with the new year as reference is misdated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use thiserror::Error;

use crate::models::{AuthEvent, AuthEventType};

/// Errors raised while reading a log file
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

static FAILED_PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<mon>\w{3})\s+(?P<day>\d{1,2})\s+(?P<time>\d{2}:\d{2}:\d{2}).*sshd\[\d+\]:\s+Failed password\s+for\s+(?:invalid user\s+)?(?P<user>\S+)\s+from\s+(?P<ip>\d+\.\d+\.\d+\.\d+)",
    )
    .expect("failed password regex")
});

static INVALID_USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<mon>\w{3})\s+(?P<day>\d{1,2})\s+(?P<time>\d{2}:\d{2}:\d{2}).*sshd\[\d+\]:\s+Invalid user\s+(?P<user>\S+)\s+from\s+(?P<ip>\d+\.\d+\.\d+\.\d+)",
    )
    .expect("invalid user regex")
});

/// Converts sshd auth log lines into [`AuthEvent`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthLogParser {
    reference_year: i32,
}

impl AuthLogParser {
    /// Create a parser that dates every line within `reference_year`
    pub fn new(reference_year: i32) -> Self {
        AuthLogParser { reference_year }
    }

    /// Create a parser using the current local calendar year
    pub fn for_current_year() -> Self {
        Self::new(Local::now().year())
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Parse a single line. Unrecognised lines yield `None`.
    pub fn parse_line(&self, raw: &str) -> Option<AuthEvent> {
        let line = raw.trim_end_matches(['\r', '\n']);

        if let Some(caps) = FAILED_PASSWORD_RE.captures(line) {
            return self.build_event(&caps, AuthEventType::FailedPassword, line);
        }
        if let Some(caps) = INVALID_USER_RE.captures(line) {
            return self.build_event(&caps, AuthEventType::InvalidUser, line);
        }
        None
    }

    /// Parse every line of the file at `path`, returning events sorted by timestamp.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; only failing to open or
    /// read the file is an error.
    pub fn parse_log(&self, path: &Path) -> Result<Vec<AuthEvent>, InputError> {
        let io_err = |source: std::io::Error| InputError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_err)?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut events = Vec::new();
        let mut lines = 0usize;

        loop {
            buf.clear();
            let bytes_read = reader.read_until(b'\n', &mut buf).map_err(io_err)?;
            if bytes_read == 0 {
                break; // EOF
            }
            lines += 1;

            let line = String::from_utf8_lossy(&buf);
            if let Some(event) = self.parse_line(&line) {
                events.push(event);
            }
        }

        // Stable: ties keep file order
        events.sort_by_key(|e| e.timestamp);

        log::info!(
            "Parsed {} event(s) from {} line(s) in {:?}",
            events.len(),
            lines,
            path
        );
        Ok(events)
    }

    fn build_event(
        &self,
        caps: &Captures<'_>,
        event_type: AuthEventType,
        line: &str,
    ) -> Option<AuthEvent> {
        let timestamp = self.syslog_timestamp(&caps["mon"], &caps["day"], &caps["time"]);
        let source_ip = caps["ip"].parse::<Ipv4Addr>().ok();

        let (Some(timestamp), Some(source_ip)) = (timestamp, source_ip) else {
            log::debug!("Discarding line with unusable date or address: {}", line);
            return None;
        };

        Some(AuthEvent {
            timestamp,
            event_type,
            source_ip,
            user: Some(caps["user"].to_string()),
            raw_line: line.to_string(),
        })
    }

    fn syslog_timestamp(&self, mon: &str, day: &str, time: &str) -> Option<NaiveDateTime> {
        let month = month_number(mon)?;
        let day: u32 = day.parse().ok()?;

        let mut parts = time.split(':').map(|p| p.parse::<u32>());
        let (Some(Ok(hour)), Some(Ok(minute)), Some(Ok(second))) =
            (parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        NaiveDate::from_ymd_opt(self.reference_year, month, day)?.and_hms_opt(hour, minute, second)
    }
}

impl Default for AuthLogParser {
    fn default() -> Self {
        Self::for_current_year()
    }
}

fn month_number(abbrev: &str) -> Option<u32> {
    let month = match abbrev.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
