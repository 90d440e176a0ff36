//! Sliding-window brute-force detection
//!
//! Counts matching authentication failures per source IP inside a sliding
//! time window and raises an alert once the count reaches the threshold.
//! Alerts for a source are suppressed until a window begins after the end
//! of the previous alert's window, so one sustained attack yields one alert.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::Ipv4Addr;

use chrono::{Duration, NaiveDateTime};

use crate::config::{ConfigError, DetectionConfig};
use crate::models::{AuthEvent, AuthEventType, BruteForceAlert};

/// Timestamps of one source's recent failures, oldest first
#[derive(Debug)]
struct SlidingWindow {
    timestamps: VecDeque<NaiveDateTime>,
    size: Duration,
}

impl SlidingWindow {
    fn new(size: Duration) -> Self {
        SlidingWindow {
            timestamps: VecDeque::new(),
            size,
        }
    }

    /// Add a timestamp and evict entries more than `size` older than it.
    /// Entries exactly `size` old stay in the window.
    fn push_and_evict(&mut self, timestamp: NaiveDateTime) {
        self.timestamps.push_back(timestamp);
        while let Some(&front) = self.timestamps.front() {
            if timestamp - front > self.size {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn start(&self) -> Option<NaiveDateTime> {
        self.timestamps.front().copied()
    }

    fn count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Detects brute-force bursts per source IP
#[derive(Debug, Clone)]
pub struct BruteForceDetector {
    /// Matching events within the window needed to alert
    threshold: usize,
    /// Sliding window duration
    window: Duration,
    /// Event types counted towards the threshold
    event_types: BTreeSet<AuthEventType>,
}

impl BruteForceDetector {
    /// Create a detector with the default settings: 10 failed passwords in 10 minutes
    pub fn new() -> Self {
        BruteForceDetector {
            threshold: 10,
            window: Duration::minutes(10),
            event_types: BTreeSet::from([AuthEventType::FailedPassword]),
        }
    }

    /// Create with custom settings
    ///
    /// A zero threshold, a non-positive window or an empty event type set is
    /// rejected rather than producing degenerate alerts.
    pub fn with_config(
        threshold: usize,
        window: Duration,
        event_types: impl IntoIterator<Item = AuthEventType>,
    ) -> Result<Self, ConfigError> {
        let event_types: BTreeSet<AuthEventType> = event_types.into_iter().collect();

        if threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "threshold".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if window <= Duration::zero() {
            return Err(ConfigError::Invalid {
                field: "window".to_string(),
                reason: format!("must be positive, got {}", window),
            });
        }
        if event_types.is_empty() {
            return Err(ConfigError::Invalid {
                field: "event_types".to_string(),
                reason: "at least one event type is required".to_string(),
            });
        }

        Ok(BruteForceDetector {
            threshold,
            window,
            event_types,
        })
    }

    /// Build a detector from the `[detection]` configuration section
    pub fn from_config(config: &DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = Duration::try_minutes(config.window_minutes).ok_or_else(|| {
            ConfigError::Invalid {
                field: "detection.window_minutes".to_string(),
                reason: format!("{} minutes is out of range", config.window_minutes),
            }
        })?;
        Self::with_config(config.threshold, window, config.event_types.iter().copied())
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn event_types(&self) -> &BTreeSet<AuthEventType> {
        &self.event_types
    }

    /// Run detection over `events` (in any order).
    ///
    /// Alerts are returned most severe first: `count_in_window` descending,
    /// then `window_start` ascending.
    pub fn detect(&self, events: &[AuthEvent]) -> Vec<BruteForceAlert> {
        let by_source = self.partition(events);

        let mut alerts: Vec<BruteForceAlert> = by_source
            .iter()
            .flat_map(|(ip, times)| self.scan_source(*ip, times))
            .collect();

        sort_by_severity(&mut alerts);

        log::info!(
            "Brute-force detection: {} source(s) checked, {} alert(s) raised",
            by_source.len(),
            alerts.len()
        );
        alerts
    }

    /// Group the timestamps of matching events by source, each list sorted ascending
    fn partition(&self, events: &[AuthEvent]) -> BTreeMap<Ipv4Addr, Vec<NaiveDateTime>> {
        let mut by_source: BTreeMap<Ipv4Addr, Vec<NaiveDateTime>> = BTreeMap::new();
        for event in events.iter().filter(|e| self.event_types.contains(&e.event_type)) {
            by_source.entry(event.source_ip).or_default().push(event.timestamp);
        }
        for times in by_source.values_mut() {
            times.sort();
        }
        by_source
    }

    /// Slide the window over one source's sorted timestamps
    fn scan_source(&self, source_ip: Ipv4Addr, times: &[NaiveDateTime]) -> Vec<BruteForceAlert> {
        let mut window = SlidingWindow::new(self.window);
        let mut last_alert_end: Option<NaiveDateTime> = None;
        let mut alerts = Vec::new();

        for &t in times {
            window.push_and_evict(t);

            if window.count() < self.threshold {
                continue;
            }
            let Some(start) = window.start() else {
                continue;
            };
            if last_alert_end.is_some_and(|end| start <= end) {
                continue;
            }

            log::warn!(
                "Brute-force detected from {}: {} attempt(s) between {} and {} (threshold {})",
                source_ip,
                window.count(),
                start,
                t,
                self.threshold
            );
            alerts.push(BruteForceAlert {
                source_ip,
                window_start: start,
                window_end: t,
                count_in_window: window.count(),
                threshold: self.threshold,
            });
            last_alert_end = Some(t);
        }

        log::debug!(
            "Source {}: {} matching event(s), {} alert(s)",
            source_ip,
            times.len(),
            alerts.len()
        );
        alerts
    }
}

/// Most windowed attempts first, then earliest window, then lowest address
fn sort_by_severity(alerts: &mut [BruteForceAlert]) {
    alerts.sort_by(|a, b| {
        b.count_in_window
            .cmp(&a.count_in_window)
            .then_with(|| a.window_start.cmp(&b.window_start))
            .then_with(|| a.source_ip.cmp(&b.source_ip))
    });
}

impl Default for BruteForceDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 28)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn create_event(ip: &str, offset_secs: i64, event_type: AuthEventType) -> AuthEvent {
        AuthEvent {
            timestamp: base() + Duration::seconds(offset_secs),
            event_type,
            source_ip: ip.parse().unwrap(),
            user: Some("root".to_string()),
            raw_line: String::new(),
        }
    }

    fn failures(ip: &str, offsets: impl IntoIterator<Item = i64>) -> Vec<AuthEvent> {
        offsets
            .into_iter()
            .map(|o| create_event(ip, o, AuthEventType::FailedPassword))
            .collect()
    }

    fn detector(threshold: usize, window_minutes: i64) -> BruteForceDetector {
        BruteForceDetector::with_config(
            threshold,
            Duration::minutes(window_minutes),
            [AuthEventType::FailedPassword],
        )
        .unwrap()
    }

    #[test]
    fn test_ten_failures_in_ten_minutes() {
        let events = failures("1.2.3.4", (0..10).map(|i| i * 60));
        let alerts = BruteForceDetector::new().detect(&events);

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.source_ip.to_string(), "1.2.3.4");
        assert_eq!(alert.count_in_window, 10);
        assert_eq!(alert.threshold, 10);
        assert_eq!(alert.window_start, base());
        assert_eq!(alert.window_end, base() + Duration::seconds(540));
    }

    #[test]
    fn test_below_threshold_never_alerts() {
        let events = failures("1.2.3.4", (0..4).map(|i| i * 10));
        assert!(detector(5, 10).detect(&events).is_empty());
    }

    #[test]
    fn test_burst_of_twice_threshold_alerts_once() {
        let events = failures("1.2.3.4", 0..10);
        let alerts = detector(5, 10).detect(&events);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].count_in_window, 5);
        assert_eq!(alerts[0].window_end, base() + Duration::seconds(4));
    }

    #[test]
    fn test_event_exactly_window_old_stays() {
        // Third event is exactly 10 minutes after the first
        let events = failures("1.2.3.4", [0, 300, 600]);
        let alerts = detector(3, 10).detect(&events);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].window_start, base());
        assert!(alerts[0].window_end - alerts[0].window_start <= Duration::minutes(10));
    }

    #[test]
    fn test_event_past_window_evicted() {
        let events = failures("1.2.3.4", [0, 300, 601]);
        assert!(detector(3, 10).detect(&events).is_empty());
    }

    #[test]
    fn test_separate_bursts_alert_separately() {
        let mut offsets: Vec<i64> = (0..3).collect();
        offsets.extend((0..3).map(|i| 3600 + i));
        let events = failures("1.2.3.4", offsets);
        let alerts = detector(3, 10).detect(&events);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].window_start, base());
        assert_eq!(alerts[1].window_start, base() + Duration::seconds(3600));
    }

    #[test]
    fn test_sustained_attack_realerts_after_boundary() {
        // One attempt per minute for 25 minutes, threshold 5 within 4 minutes.
        // Windows: [0,4] alerts; the next window starting after minute 4 is [5,9], etc.
        let events = failures("1.2.3.4", (0..25).map(|i| i * 60));
        let alerts = detector(5, 4).detect(&events);

        assert_eq!(alerts.len(), 5);
        for alert in &alerts {
            assert_eq!(alert.count_in_window, 5);
        }
        let starts: Vec<i64> = alerts
            .iter()
            .map(|a| (a.window_start - base()).num_minutes())
            .collect();
        assert_eq!(starts, vec![0, 5, 10, 15, 20]);
    }

    #[test]
    fn test_sources_are_independent() {
        let mut events = failures("1.1.1.1", [0, 10]);
        events.extend(failures("2.2.2.2", [5, 15]));
        assert!(detector(3, 10).detect(&events).is_empty());
    }

    #[test]
    fn test_unsorted_input() {
        let events = failures("1.2.3.4", [540, 0, 300, 60, 120]);
        let alerts = detector(5, 10).detect(&events);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].window_start, base());
        assert_eq!(alerts[0].window_end, base() + Duration::seconds(540));
    }

    #[test]
    fn test_event_types_filter() {
        let events: Vec<AuthEvent> = (0..5)
            .map(|i| create_event("1.2.3.4", i, AuthEventType::InvalidUser))
            .collect();

        assert!(detector(5, 10).detect(&events).is_empty());

        let both = BruteForceDetector::with_config(
            5,
            Duration::minutes(10),
            [AuthEventType::FailedPassword, AuthEventType::InvalidUser],
        )
        .unwrap();
        assert_eq!(both.detect(&events).len(), 1);
    }

    #[test]
    fn test_global_order_by_count_then_start() {
        // Earlier, smaller burst from 1.1.1.1; later, larger burst from 2.2.2.2
        let mut events = failures("1.1.1.1", 0..15);
        events.extend(failures("2.2.2.2", (0..20).map(|i| 7200 + i)));
        events.extend(failures("3.3.3.3", (0..15).map(|i| 3600 + i)));

        let alerts = BruteForceDetector::with_config(
            15,
            Duration::minutes(10),
            [AuthEventType::FailedPassword],
        )
        .unwrap()
        .detect(&events);

        // Threshold 15 means 2.2.2.2 alerts at its 15th event with count 15.
        assert_eq!(alerts.len(), 3);
        assert!(alerts.iter().all(|a| a.count_in_window == 15));
        let ips: Vec<String> = alerts.iter().map(|a| a.source_ip.to_string()).collect();
        assert_eq!(ips, vec!["1.1.1.1", "3.3.3.3", "2.2.2.2"]);
    }

    #[test]
    fn test_higher_count_sorts_first() {
        let alert = |ip: &str, start: i64, count: usize| BruteForceAlert {
            source_ip: ip.parse().unwrap(),
            window_start: base() + Duration::seconds(start),
            window_end: base() + Duration::seconds(start + 60),
            count_in_window: count,
            threshold: 10,
        };
        let mut alerts = vec![alert("1.1.1.1", 0, 15), alert("2.2.2.2", 3600, 20)];

        sort_by_severity(&mut alerts);

        assert_eq!(alerts[0].count_in_window, 20);
        assert_eq!(alerts[1].count_in_window, 15);
    }

    #[test]
    fn test_suppressed_attempts_counted_in_next_alert() {
        // First alert covers [0, 1]; attempts at 2..20 are suppressed but stay
        // in the window, and are counted once the window moves past second 1.
        let mut offsets = vec![0, 1];
        offsets.extend(2..20);
        offsets.extend([601, 602]);
        let alerts = detector(2, 10).detect(&failures("1.2.3.4", offsets));

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].count_in_window, 20);
        assert_eq!(alerts[0].window_start, base() + Duration::seconds(2));
        assert_eq!(alerts[0].window_end, base() + Duration::seconds(602));
        assert_eq!(alerts[1].count_in_window, 2);
        assert_eq!(alerts[1].window_start, base());
    }

    #[test]
    fn test_empty_input() {
        assert!(BruteForceDetector::new().detect(&[]).is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(BruteForceDetector::with_config(
            0,
            Duration::minutes(10),
            [AuthEventType::FailedPassword]
        )
        .is_err());
        assert!(BruteForceDetector::with_config(
            5,
            Duration::zero(),
            [AuthEventType::FailedPassword]
        )
        .is_err());
        assert!(BruteForceDetector::with_config(5, Duration::minutes(1), Vec::<AuthEventType>::new()).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = DetectionConfig {
            threshold: 3,
            window_minutes: 2,
            event_types: vec![AuthEventType::InvalidUser],
        };
        let detector = BruteForceDetector::from_config(&config).unwrap();

        assert_eq!(detector.threshold(), 3);
        assert_eq!(detector.window(), Duration::minutes(2));
        assert!(detector.event_types().contains(&AuthEventType::InvalidUser));
        assert!(!detector.event_types().contains(&AuthEventType::FailedPassword));
    }
}
