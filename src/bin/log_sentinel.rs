use std::path::PathBuf;
use structopt::StructOpt;

use log_sentinel::config::Config;
use log_sentinel::models::AuthEventType;
use log_sentinel::output::{build_report, write_report};
use log_sentinel::{AuthLogParser, BruteForceDetector};

/// SSH auth log brute-force detector (authorized use only)
#[derive(StructOpt, Debug)]
#[structopt(
    name = "log-sentinel",
    about = "Parse SSH auth logs and detect brute-force patterns"
)]
pub enum Cli {
    /// Parse a log, detect brute-force bursts and write JSON + Markdown reports
    Analyze {
        /// Path to auth.log (or similar)
        #[structopt(short, long = "log")]
        log_path: PathBuf,
        /// Failures in window to trigger an alert
        #[structopt(short, long)]
        threshold: Option<usize>,
        /// Sliding window size in minutes
        #[structopt(short, long)]
        window_minutes: Option<i64>,
        /// Event types to count, comma separated (failed_password, invalid_user)
        #[structopt(short, long, use_delimiter = true)]
        event_types: Vec<AuthEventType>,
        /// Year assumed for log timestamps (defaults to the current year)
        #[structopt(short, long)]
        year: Option<i32>,
        /// Output directory for reports
        #[structopt(short, long)]
        out: Option<PathBuf>,
        /// Optional configuration file
        #[structopt(short, long)]
        config: Option<PathBuf>,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Parse and display auth events from a file
    Parse {
        /// Path to log file
        #[structopt(short, long)]
        file: PathBuf,
        /// Number of events to display
        #[structopt(short, long, default_value = "10")]
        lines: usize,
        /// Year assumed for log timestamps (defaults to the current year)
        #[structopt(short, long)]
        year: Option<i32>,
    },
}

fn parser_for(year: Option<i32>) -> AuthLogParser {
    match year {
        Some(year) => AuthLogParser::new(year),
        None => AuthLogParser::for_current_year(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    match Cli::from_args() {
        Cli::Analyze {
            log_path,
            threshold,
            window_minutes,
            event_types,
            year,
            out,
            config,
        } => {
            let mut config = match config {
                Some(path) => {
                    let config = Config::from_file(&path)?;
                    log::info!("Configuration loaded from {:?}", path);
                    config
                }
                None => Config::default(),
            };

            // Command-line flags win over the configuration file
            if let Some(threshold) = threshold {
                config.detection.threshold = threshold;
            }
            if let Some(window_minutes) = window_minutes {
                config.detection.window_minutes = window_minutes;
            }
            if !event_types.is_empty() {
                config.detection.event_types = event_types;
            }
            if year.is_some() {
                config.parser.reference_year = year;
            }
            if let Some(out) = out {
                config.output.directory = out;
            }
            config.validate()?;

            let parser = parser_for(config.parser.reference_year);
            let detector = BruteForceDetector::from_config(&config.detection)?;
            log::info!(
                "Analyzing {:?} (year {}, threshold {}, window {} min, types {:?})",
                log_path,
                parser.reference_year(),
                config.detection.threshold,
                config.detection.window_minutes,
                config.detection.event_types
            );

            let events = parser.parse_log(&log_path)?;
            let alerts = detector.detect(&events);
            let report = build_report(&events, &alerts);
            write_report(&config.output.directory, &report)?;

            println!(
                "Parsed events: {} | Alerts: {} | Output: {}",
                events.len(),
                alerts.len(),
                config.output.directory.display()
            );
        }
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Parse { file, lines, year } => {
            let events = parser_for(year).parse_log(&file)?;
            let display_count = std::cmp::min(lines, events.len());

            println!("Parsed {} event(s) (showing {}):\n", events.len(), display_count);
            for event in events.iter().take(display_count) {
                println!(
                    "  {}  {:<15}  {:<16}  user={}",
                    event.timestamp.format("%Y-%m-%dT%H:%M:%S"),
                    event.source_ip.to_string(),
                    event.event_type.as_str(),
                    event.user.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
