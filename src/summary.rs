//! End-of-session summary
//!
//! Condenses a tracker's ledger into the figures shown when a session ends,
//! graded into a coarse performance level.

use crate::stats::format_one_decimal;
use crate::tracker::PostureStateTracker;
use crate::types::Label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse grade derived from the not-contact ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl PerformanceLevel {
    /// Grade a not-contact ratio given in percent
    pub fn from_ratio(ratio_pct: f64) -> Self {
        if ratio_pct < 10.0 {
            PerformanceLevel::Excellent
        } else if ratio_pct < 20.0 {
            PerformanceLevel::Good
        } else if ratio_pct < 35.0 {
            PerformanceLevel::NeedsImprovement
        } else {
            PerformanceLevel::Poor
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "Excellent!",
            PerformanceLevel::Good => "Good Job!",
            PerformanceLevel::NeedsImprovement => "Keep Trying!",
            PerformanceLevel::Poor => "Needs Work",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => {
                "You kept your focus on the screen for nearly the whole session."
            }
            PerformanceLevel::Good => {
                "Solid session. A little more attention on the screen and it would be perfect."
            }
            PerformanceLevel::NeedsImprovement => {
                "There is room for improvement. Try to stay more focused next time."
            }
            PerformanceLevel::Poor => {
                "You were distracted quite a bit. Remember to look at the camera more often."
            }
        }
    }
}

/// Figures presented when a session ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Wall-clock session length, whole seconds
    pub duration_sec: u64,
    pub not_contact_ratio: String,
    pub not_contact_count: u64,
    pub not_contact_duration_sec: String,
    pub class_percentages: BTreeMap<Label, String>,
    pub performance: PerformanceLevel,
    pub badge: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionSummary {
    /// Summarize the tracker's session as of `ended_at_ms`
    pub fn from_tracker(tracker: &PostureStateTracker, ended_at_ms: i64) -> Self {
        let stats = tracker.stats();
        // graded on the displayed value, so "10.0" never reads as excellent
        let shown_ratio: f64 = stats.not_contact_ratio.parse().unwrap_or(0.0);
        let performance = PerformanceLevel::from_ratio(shown_ratio);
        let duration_ms = ended_at_ms
            .saturating_sub(tracker.session_start_ms())
            .max(0);

        Self {
            duration_sec: (duration_ms / 1000) as u64,
            not_contact_ratio: stats.not_contact_ratio,
            not_contact_count: stats.not_contact_count,
            not_contact_duration_sec: stats.not_contact_duration_sec,
            class_percentages: stats.class_percentages,
            performance,
            badge: performance.badge().to_string(),
            message: performance.message().to_string(),
            ended_at: DateTime::<Utc>::from_timestamp_millis(ended_at_ms),
        }
    }

    /// Session length as `"<minutes> min"`, minutes rounded down
    pub fn duration_label(&self) -> String {
        format!("{} min", self.duration_sec / 60)
    }

    /// Distracted share of the session rendered for display
    pub fn ratio_label(&self) -> String {
        let ratio: f64 = self.not_contact_ratio.parse().unwrap_or(0.0);
        format!("{}%", format_one_decimal(ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::types::{ClassificationSample, GOOD_POSTURE, LOOKING_AWAY};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_performance_thresholds() {
        assert_eq!(PerformanceLevel::from_ratio(0.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_ratio(9.9), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_ratio(10.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_ratio(19.9), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_ratio(20.0), PerformanceLevel::NeedsImprovement);
        assert_eq!(PerformanceLevel::from_ratio(34.9), PerformanceLevel::NeedsImprovement);
        assert_eq!(PerformanceLevel::from_ratio(35.0), PerformanceLevel::Poor);
        assert_eq!(PerformanceLevel::from_ratio(100.0), PerformanceLevel::Poor);
    }

    #[test]
    fn test_summary_from_tracker() {
        let config = TrackerConfig::default().with_history_size(1);
        let mut tracker = PostureStateTracker::starting_at(config, 0).unwrap();

        let good = ClassificationSample::from_pairs([(GOOD_POSTURE, 0.9), (LOOKING_AWAY, 0.1)])
            .unwrap();
        let away = ClassificationSample::from_pairs([(GOOD_POSTURE, 0.1), (LOOKING_AWAY, 0.9)])
            .unwrap();

        tracker.process(&good, 0);
        tracker.process(&good, 90_000);
        tracker.process(&away, 120_000);

        let summary = SessionSummary::from_tracker(&tracker, 125_000);

        assert_eq!(summary.duration_sec, 125);
        assert_eq!(summary.duration_label(), "2 min");
        assert_eq!(summary.not_contact_ratio, "25.0");
        assert_eq!(summary.ratio_label(), "25.0%");
        assert_eq!(summary.not_contact_count, 1);
        assert_eq!(summary.not_contact_duration_sec, "30.0");
        assert_eq!(summary.performance, PerformanceLevel::NeedsImprovement);
        assert_eq!(summary.badge, "Keep Trying!");
        assert_eq!(
            summary.ended_at.map(|t| t.timestamp_millis()),
            Some(125_000)
        );
    }

    #[test]
    fn test_grade_follows_displayed_ratio() {
        let config = TrackerConfig::default().with_history_size(1);
        let mut tracker = PostureStateTracker::starting_at(config, 0).unwrap();

        let good = ClassificationSample::from_pairs([(GOOD_POSTURE, 0.9), (LOOKING_AWAY, 0.1)])
            .unwrap();
        let away = ClassificationSample::from_pairs([(GOOD_POSTURE, 0.1), (LOOKING_AWAY, 0.9)])
            .unwrap();

        // 996 of 10000 ms away: 9.96% shows as "10.0"
        tracker.process(&good, 0);
        tracker.process(&good, 9_004);
        tracker.process(&away, 10_000);

        let summary = SessionSummary::from_tracker(&tracker, 10_000);
        assert_eq!(summary.not_contact_ratio, "10.0");
        assert_eq!(summary.performance, PerformanceLevel::Good);
        assert_eq!(summary.badge, "Good Job!");
    }

    #[test]
    fn test_end_before_start_gives_zero_duration() {
        let tracker =
            PostureStateTracker::starting_at(TrackerConfig::default(), 10_000).unwrap();
        let summary = SessionSummary::from_tracker(&tracker, 5_000);
        assert_eq!(summary.duration_sec, 0);
        assert_eq!(summary.performance, PerformanceLevel::Excellent);
    }

    #[test]
    fn test_performance_serializes_kebab_case() {
        let value = serde_json::to_value(PerformanceLevel::NeedsImprovement).unwrap();
        assert_eq!(value, "needs-improvement");
    }
}
