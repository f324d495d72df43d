//! Posture state tracker
//!
//! Turns a stream of noisy per-frame classifications into a stable status:
//! raw top label -> majority vote over the recent window -> status transition
//! and duration accounting -> dwell-time warning.
//!
//! The tracker has no timer of its own. Time only advances through the
//! timestamp handed to [`PostureStateTracker::process`], so callers (and tests)
//! control every delta, including clock jumps after a suspended host resumes.

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::history::HistoryBuffer;
use crate::stats::SessionLedger;
use crate::types::{ClassificationSample, Label, SessionStats, Snapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// How much state a reset discards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Clear the history window and per-class durations only. Session
    /// counters, current status and the warning flag carry over.
    #[default]
    Soft,
    /// Return to the freshly constructed state
    Full,
}

/// Stateful smoothing, hysteresis and accounting engine for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureStateTracker {
    config: TrackerConfig,
    session_start_ms: i64,
    history: HistoryBuffer,
    current_status: Label,
    last_status_change_ms: i64,
    last_process_ms: i64,
    warning_active: bool,
    ledger: SessionLedger,
}

impl PostureStateTracker {
    /// Create a tracker anchored at the current wall-clock time
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        Self::starting_at(config, now_ms())
    }

    /// Create a tracker anchored at an explicit start time (ms)
    pub fn starting_at(config: TrackerConfig, start_ms: i64) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            session_start_ms: start_ms,
            history: HistoryBuffer::new(config.history_size),
            current_status: config.contact_label.clone(),
            last_status_change_ms: start_ms,
            last_process_ms: start_ms,
            warning_active: false,
            ledger: SessionLedger::new(config.label_set.len()),
            config,
        })
    }

    /// Feed one classification sample observed at `timestamp_ms`
    pub fn process(&mut self, sample: &ClassificationSample, timestamp_ms: i64) -> Snapshot {
        // Raw classification and smoothing
        self.history.push(sample.top_label().clone());
        let smoothed = self
            .history
            .majority()
            .cloned()
            .unwrap_or_else(|| self.config.contact_label.clone());

        // Duration accounting
        let raw_dt = timestamp_ms.saturating_sub(self.last_process_ms);
        self.last_process_ms = timestamp_ms;
        let dt = self.config.timestamp_policy.apply(raw_dt);
        if dt != raw_dt {
            log::warn!(
                "timestamp delta {raw_dt}ms adjusted to {dt}ms by {:?}",
                self.config.timestamp_policy
            );
        }

        self.ledger.record_elapsed(dt);
        let class_index = self.config.label_index(&smoothed);
        if let Some(index) = class_index {
            self.ledger.record_class(index, dt);
        }

        // Status transition
        let is_contact = smoothed == self.config.contact_label;
        if smoothed != self.current_status {
            let was_contact = self.current_status == self.config.contact_label;
            if was_contact && !is_contact {
                self.ledger.record_departure();
            }
            if class_index.is_none() {
                log::warn!(
                    "status '{smoothed}' is not in the configured label set; its time is not attributed to any class"
                );
            }
            log::debug!(
                "status {} -> {} at {timestamp_ms}",
                self.current_status,
                smoothed
            );
            self.current_status = smoothed;
            self.last_status_change_ms = timestamp_ms;
        }

        if !is_contact {
            self.ledger.record_not_contact(dt);
        }

        // Hysteresis
        if is_contact {
            if self.warning_active {
                log::info!("warning cleared at {timestamp_ms}");
            }
            self.warning_active = false;
        } else if !self.warning_active {
            let time_in_state = timestamp_ms.saturating_sub(self.last_status_change_ms);
            if time_in_state >= 0 && time_in_state as u64 >= self.config.not_contact_threshold_ms
            {
                log::info!(
                    "warning raised after {time_in_state}ms in '{}'",
                    self.current_status
                );
                self.warning_active = true;
            }
        }

        Snapshot {
            status: self.current_status.clone(),
            is_contact,
            is_warning: self.warning_active,
            stats: self.stats(),
        }
    }

    /// Formatted statistics for the session so far
    pub fn stats(&self) -> SessionStats {
        self.ledger.view(&self.config.label_set)
    }

    /// Soft reset anchored at the current wall-clock time
    pub fn reset(&mut self) {
        self.reset_at(now_ms(), ResetScope::Soft);
    }

    /// Reset anchored at `now_ms`, discarding the state selected by `scope`
    pub fn reset_at(&mut self, now_ms: i64, scope: ResetScope) {
        log::debug!("{scope:?} reset at {now_ms}");
        match scope {
            ResetScope::Soft => {
                self.history.clear();
                self.ledger.clear_class_durations();
                self.last_process_ms = now_ms;
            }
            ResetScope::Full => {
                self.session_start_ms = now_ms;
                self.history.clear();
                self.ledger = SessionLedger::new(self.config.label_set.len());
                self.current_status = self.config.contact_label.clone();
                self.last_status_change_ms = now_ms;
                self.last_process_ms = now_ms;
                self.warning_active = false;
            }
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// When the session began (ms), moved only by a full reset
    pub fn session_start_ms(&self) -> i64 {
        self.session_start_ms
    }

    pub fn current_status(&self) -> &Label {
        &self.current_status
    }

    pub fn is_warning_active(&self) -> bool {
        self.warning_active
    }

    pub fn last_status_change_ms(&self) -> i64 {
        self.last_status_change_ms
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Raw millisecond accumulators behind [`Self::stats`]
    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    /// Restore a tracker from persisted JSON state
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let tracker: Self = serde_json::from_str(json)?;
        tracker.config.validate()?;
        tracker.history.check_integrity(tracker.config.history_size)?;
        tracker.ledger.check_integrity(tracker.config.label_set.len())?;
        Ok(tracker)
    }

    /// Serialize the full tracker state to JSON
    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(self)?)
    }
}
