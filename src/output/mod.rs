//! Report building and rendering
//!
//! A [`Report`] is built once from parsed events and detector alerts, then
//! rendered as pretty JSON (`report.json`) and a Markdown narrative (`report.md`).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AuthEvent, AuthEventType, BruteForceAlert};

/// Number of source IPs listed in `top_source_ips`
pub const TOP_SOURCE_IPS: usize = 10;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Errors that can occur while writing reports
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub top_source_ips: Vec<IpCount>,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_events: usize,
    pub failed_password: usize,
    pub invalid_user: usize,
    pub unique_source_ips: usize,
    pub time_range: TimeRange,
}

/// First and last event timestamps, `None` when there are no events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpCount {
    pub ip: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub ip: String,
    pub window_start: String,
    pub window_end: String,
    pub count_in_window: usize,
    pub threshold: usize,
}

impl From<&BruteForceAlert> for AlertRecord {
    fn from(alert: &BruteForceAlert) -> Self {
        AlertRecord {
            ip: alert.source_ip.to_string(),
            window_start: iso8601(&alert.window_start),
            window_end: iso8601(&alert.window_end),
            count_in_window: alert.count_in_window,
            threshold: alert.threshold,
        }
    }
}

fn iso8601(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Build the report document. Alert order is kept as given.
pub fn build_report(events: &[AuthEvent], alerts: &[BruteForceAlert]) -> Report {
    Report {
        summary: summarize(events),
        top_source_ips: top_source_ips(events, TOP_SOURCE_IPS),
        alerts: alerts.iter().map(AlertRecord::from).collect(),
    }
}

pub fn summarize(events: &[AuthEvent]) -> Summary {
    let count_of = |kind: AuthEventType| events.iter().filter(|e| e.event_type == kind).count();
    let unique_source_ips = events
        .iter()
        .map(|e| e.source_ip)
        .collect::<std::collections::HashSet<_>>()
        .len();

    Summary {
        total_events: events.len(),
        failed_password: count_of(AuthEventType::FailedPassword),
        invalid_user: count_of(AuthEventType::InvalidUser),
        unique_source_ips,
        time_range: TimeRange {
            start: events.iter().map(|e| e.timestamp).min().as_ref().map(iso8601),
            end: events.iter().map(|e| e.timestamp).max().as_ref().map(iso8601),
        },
    }
}

/// Most active sources, count descending; ties keep first-seen order
pub fn top_source_ips(events: &[AuthEvent], limit: usize) -> Vec<IpCount> {
    let mut order: Vec<Ipv4Addr> = Vec::new();
    let mut counts: HashMap<Ipv4Addr, usize> = HashMap::new();

    // Both recognised event types count as failed login activity
    for event in events {
        let count = counts.entry(event.source_ip).or_insert_with(|| {
            order.push(event.source_ip);
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<IpCount> = order
        .into_iter()
        .map(|ip| IpCount {
            ip: ip.to_string(),
            count: counts[&ip],
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Render the human-readable Markdown form
pub fn render_markdown(report: &Report) -> String {
    let s = &report.summary;
    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "# Log Sentinel Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out, "- Total events: {}", s.total_events);
    let _ = writeln!(out, "- Failed password: {}", s.failed_password);
    let _ = writeln!(out, "- Invalid user: {}", s.invalid_user);
    let _ = writeln!(out, "- Unique source IPs: {}", s.unique_source_ips);
    let _ = writeln!(
        out,
        "- Time range: {} -> {}",
        or_none(&s.time_range.start),
        or_none(&s.time_range.end)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Top source IPs");
    for row in &report.top_source_ips {
        let _ = writeln!(out, "- {}: {}", row.ip, row.count);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Alerts");
    if report.alerts.is_empty() {
        let _ = writeln!(out, "- No alerts triggered.");
    } else {
        for a in &report.alerts {
            let _ = writeln!(
                out,
                "- **{}**: {} failures between {} and {} (threshold {})",
                a.ip, a.count_in_window, a.window_start, a.window_end, a.threshold
            );
        }
    }
    out
}

/// Write `report.json` and `report.md` into `out_dir`, creating it if needed.
///
/// Returns the paths of the JSON and Markdown files.
pub fn write_report(out_dir: &Path, report: &Report) -> Result<(PathBuf, PathBuf), ReportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ReportError::Io { path, source }
    };

    std::fs::create_dir_all(out_dir).map_err(io_err(out_dir))?;

    let json_path = out_dir.join("report.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&json_path, json).map_err(io_err(&json_path))?;

    let md_path = out_dir.join("report.md");
    std::fs::write(&md_path, render_markdown(report)).map_err(io_err(&md_path))?;

    log::info!("Reports written to {:?} and {:?}", json_path, md_path);
    Ok((json_path, md_path))
}
