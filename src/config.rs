//! Tracker configuration
//!
//! Configuration is supplied once at construction and never changes for the
//! lifetime of a tracker. It round-trips through JSON so the same settings can
//! be shared between the CLI, the FFI surface and persisted tracker state.

use crate::error::TrackerError;
use crate::types::{Label, GOOD_POSTURE, LOOKING_AWAY, LOOKING_DOWN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Default number of raw samples in the majority-vote window
pub const DEFAULT_HISTORY_SIZE: usize = 5;

/// Default dwell time outside the contact state before a warning fires (ms)
pub const DEFAULT_NOT_CONTACT_THRESHOLD_MS: u64 = 2000;

/// How inter-call timestamp deltas are admitted into duration accounting.
///
/// The hysteresis dwell check always uses raw timestamps; only the
/// accumulators see the adjusted delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Use every delta as-is, including negative ones
    Passthrough,
    /// Treat negative deltas (clock stepped backwards) as zero
    #[default]
    ClampNegative,
    /// Treat negative deltas as zero and cut large gaps down to `max_delta_ms`
    Capped {
        #[serde(rename = "maxDeltaMs")]
        max_delta_ms: i64,
    },
}

impl TimestampPolicy {
    /// Adjust a raw delta according to the policy
    pub fn apply(self, dt: i64) -> i64 {
        match self {
            TimestampPolicy::Passthrough => dt,
            TimestampPolicy::ClampNegative => dt.max(0),
            TimestampPolicy::Capped { max_delta_ms } => dt.clamp(0, max_delta_ms),
        }
    }
}

/// Construction-time configuration for a [`crate::tracker::PostureStateTracker`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Majority-vote window size (raw samples)
    pub history_size: usize,
    /// Continuous non-contact dwell before the warning activates (ms)
    pub not_contact_threshold_ms: u64,
    /// The designated "good" label
    pub contact_label: Label,
    /// Ordered, exhaustive set of labels tracked for per-class durations
    pub label_set: Vec<Label>,
    pub timestamp_policy: TimestampPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            not_contact_threshold_ms: DEFAULT_NOT_CONTACT_THRESHOLD_MS,
            contact_label: Label::from(GOOD_POSTURE),
            label_set: vec![
                Label::from(GOOD_POSTURE),
                Label::from(LOOKING_AWAY),
                Label::from(LOOKING_DOWN),
            ],
            timestamp_policy: TimestampPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    pub fn with_not_contact_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.not_contact_threshold_ms = threshold_ms;
        self
    }

    pub fn with_contact_label(mut self, label: impl Into<Label>) -> Self {
        self.contact_label = label.into();
        self
    }

    pub fn with_label_set<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.label_set = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }

    /// Check the configuration for values the tracker cannot operate with
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.history_size == 0 {
            return Err(TrackerError::InvalidConfig(
                "historySize must be at least 1".to_string(),
            ));
        }

        if self.label_set.is_empty() {
            return Err(TrackerError::InvalidConfig(
                "labelSet must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.label_set.len());
        for label in &self.label_set {
            if label.as_str().is_empty() {
                return Err(TrackerError::InvalidConfig(
                    "labelSet contains an empty label".to_string(),
                ));
            }
            if !seen.insert(label.as_str()) {
                return Err(TrackerError::InvalidConfig(format!(
                    "labelSet contains duplicate label '{label}'"
                )));
            }
        }

        if !seen.contains(self.contact_label.as_str()) {
            return Err(TrackerError::InvalidConfig(format!(
                "contactLabel '{}' is not in labelSet",
                self.contact_label
            )));
        }

        if let TimestampPolicy::Capped { max_delta_ms } = self.timestamp_policy {
            if max_delta_ms <= 0 {
                return Err(TrackerError::InvalidConfig(
                    "timestampPolicy.maxDeltaMs must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Position of a label within the configured label set
    pub fn label_index(&self, label: &Label) -> Option<usize> {
        self.label_set.iter().position(|l| l == label)
    }

    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), TrackerError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
