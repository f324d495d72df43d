//! Session statistics ledger
//!
//! Raw millisecond accumulators live here; [`SessionLedger::view`] renders them
//! into the formatted [`SessionStats`] handed to presentation collaborators.

use crate::error::TrackerError;
use crate::types::{Label, SessionStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cumulative duration and transition accounting for one session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLedger {
    total_elapsed_ms: i64,
    not_contact_count: u64,
    not_contact_duration_ms: i64,
    /// Indexed in label-set order
    class_duration_ms: Vec<i64>,
}

impl SessionLedger {
    pub fn new(label_count: usize) -> Self {
        Self {
            class_duration_ms: vec![0; label_count],
            ..Default::default()
        }
    }

    pub fn total_elapsed_ms(&self) -> i64 {
        self.total_elapsed_ms
    }

    pub fn not_contact_count(&self) -> u64 {
        self.not_contact_count
    }

    pub fn not_contact_duration_ms(&self) -> i64 {
        self.not_contact_duration_ms
    }

    pub fn class_duration_ms(&self, index: usize) -> i64 {
        self.class_duration_ms.get(index).copied().unwrap_or(0)
    }

    /// Sum of all per-class durations
    pub fn class_durations_total(&self) -> i64 {
        self.class_duration_ms.iter().sum()
    }

    pub(crate) fn record_elapsed(&mut self, dt: i64) {
        self.total_elapsed_ms = self.total_elapsed_ms.saturating_add(dt);
    }

    pub(crate) fn record_class(&mut self, index: usize, dt: i64) {
        if let Some(slot) = self.class_duration_ms.get_mut(index) {
            *slot = slot.saturating_add(dt);
        }
    }

    pub(crate) fn record_not_contact(&mut self, dt: i64) {
        self.not_contact_duration_ms = self.not_contact_duration_ms.saturating_add(dt);
    }

    /// Count a contact to non-contact transition
    pub(crate) fn record_departure(&mut self) {
        self.not_contact_count += 1;
    }

    pub(crate) fn clear_class_durations(&mut self) {
        self.class_duration_ms.iter_mut().for_each(|d| *d = 0);
    }

    /// Render the formatted statistics view for the given label set
    pub fn view(&self, label_set: &[Label]) -> SessionStats {
        let mut class_percentages = BTreeMap::new();
        let mut class_durations = BTreeMap::new();

        for (index, label) in label_set.iter().enumerate() {
            let duration = self.class_duration_ms(index);
            class_percentages.insert(
                label.clone(),
                format_one_decimal(percentage(duration, self.total_elapsed_ms)),
            );
            class_durations.insert(label.clone(), duration);
        }

        SessionStats {
            not_contact_count: self.not_contact_count,
            not_contact_duration_sec: format_one_decimal(
                self.not_contact_duration_ms as f64 / 1000.0,
            ),
            not_contact_ratio: format_one_decimal(self.not_contact_ratio()),
            class_percentages,
            class_durations,
        }
    }

    /// Percentage of elapsed time spent outside the contact state
    pub fn not_contact_ratio(&self) -> f64 {
        percentage(self.not_contact_duration_ms, self.total_elapsed_ms)
    }

    pub(crate) fn check_integrity(&self, label_count: usize) -> Result<(), TrackerError> {
        if self.class_duration_ms.len() != label_count {
            return Err(TrackerError::StateError(format!(
                "ledger tracks {} classes but labelSet has {label_count}",
                self.class_duration_ms.len()
            )));
        }
        Ok(())
    }
}

/// `part` as a percentage of `total`, zero when nothing has elapsed
pub fn percentage(part: i64, total: i64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Fixed one-decimal rendering used throughout the stats view
pub fn format_one_decimal(value: f64) -> String {
    let formatted = format!("{value:.1}");
    // small negatives round to "-0.0"
    if formatted == "-0.0" {
        "0.0".to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels() -> Vec<Label> {
        vec![
            Label::from("good_posture"),
            Label::from("looking_away"),
            Label::from("looking_down"),
        ]
    }

    #[test]
    fn test_ratio_formatting() {
        let mut ledger = SessionLedger::new(3);
        ledger.record_elapsed(10_000);
        ledger.record_not_contact(2_500);

        let stats = ledger.view(&labels());
        assert_eq!(stats.not_contact_ratio, "25.0");
        assert_eq!(stats.not_contact_duration_sec, "2.5");
    }

    #[test]
    fn test_format_one_decimal() {
        assert_eq!(format_one_decimal(33.333), "33.3");
        assert_eq!(format_one_decimal(-0.0), "0.0");
        assert_eq!(format_one_decimal(-0.04), "0.0");
        assert_eq!(format_one_decimal(-1.26), "-1.3");
    }

    #[test]
    fn test_zero_elapsed_gives_zero_percentages() {
        let ledger = SessionLedger::new(3);
        let stats = ledger.view(&labels());

        assert_eq!(stats.not_contact_ratio, "0.0");
        assert_eq!(stats.not_contact_duration_sec, "0.0");
        for value in stats.class_percentages.values() {
            assert_eq!(value, "0.0");
        }
        assert_eq!(stats.class_durations.len(), 3);
    }

    #[test]
    fn test_class_percentages() {
        let mut ledger = SessionLedger::new(3);
        ledger.record_elapsed(3_000);
        ledger.record_class(0, 2_000);
        ledger.record_class(1, 1_000);

        let stats = ledger.view(&labels());
        assert_eq!(stats.class_percentages[&Label::from("good_posture")], "66.7");
        assert_eq!(stats.class_percentages[&Label::from("looking_away")], "33.3");
        assert_eq!(stats.class_percentages[&Label::from("looking_down")], "0.0");
        assert_eq!(stats.class_durations[&Label::from("good_posture")], 2_000);
        assert_eq!(ledger.class_durations_total(), 3_000);
    }

    #[test]
    fn test_clear_class_durations_keeps_totals() {
        let mut ledger = SessionLedger::new(3);
        ledger.record_elapsed(500);
        ledger.record_class(2, 500);
        ledger.record_not_contact(500);
        ledger.record_departure();

        ledger.clear_class_durations();

        assert_eq!(ledger.class_durations_total(), 0);
        assert_eq!(ledger.total_elapsed_ms(), 500);
        assert_eq!(ledger.not_contact_duration_ms(), 500);
        assert_eq!(ledger.not_contact_count(), 1);
    }

    #[test]
    fn test_integrity_checks_class_count() {
        let ledger = SessionLedger::new(3);
        assert!(ledger.check_integrity(3).is_ok());
        assert!(ledger.check_integrity(2).is_err());
    }
}
