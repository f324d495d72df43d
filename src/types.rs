//! Core types for the Posture Flux tracker
//!
//! This module defines the data structures that flow through the tracker:
//! labels, validated probabilities, classification samples and the
//! per-call snapshot handed to presentation collaborators.

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Default contact ("good") label
pub const GOOD_POSTURE: &str = "good_posture";
/// Default label for gaze directed away from the screen
pub const LOOKING_AWAY: &str = "looking_away";
/// Default label for gaze directed below the screen
pub const LOOKING_DOWN: &str = "looking_down";

/// A class name produced by the posture classifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Label {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A classifier probability, guaranteed finite and within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    pub fn new(value: f64) -> Result<Self, TrackerError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(TrackerError::InvalidInput(format!(
                "probability must be within [0, 1], got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Probability {
    type Error = TrackerError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> Self {
        p.0
    }
}

/// A single (label, probability) pair from the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    pub probability: Probability,
}

impl Prediction {
    pub fn new(label: impl Into<Label>, probability: f64) -> Result<Self, TrackerError> {
        Ok(Self {
            label: label.into(),
            probability: Probability::new(probability)?,
        })
    }
}

/// One frame's classification output. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSample {
    predictions: Vec<Prediction>,
}

impl ClassificationSample {
    /// Build a sample, rejecting an empty prediction set
    pub fn new(predictions: Vec<Prediction>) -> Result<Self, TrackerError> {
        if predictions.is_empty() {
            return Err(TrackerError::InvalidInput(
                "classification sample has no predictions".to_string(),
            ));
        }
        Ok(Self { predictions })
    }

    /// Build a sample from raw `(label, probability)` pairs, validating each probability
    pub fn from_pairs<I, L>(pairs: I) -> Result<Self, TrackerError>
    where
        I: IntoIterator<Item = (L, f64)>,
        L: Into<Label>,
    {
        let predictions = pairs
            .into_iter()
            .map(|(label, probability)| Prediction::new(label, probability))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(predictions)
    }

    /// Label with the highest probability. Ties keep the earliest prediction.
    pub fn top_label(&self) -> &Label {
        let mut best = &self.predictions[0];
        for prediction in &self.predictions[1..] {
            if prediction.probability.value() > best.probability.value() {
                best = prediction;
            }
        }
        &best.label
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Formatted session statistics, as consumed by presentation collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Number of contact to non-contact transitions
    pub not_contact_count: u64,
    /// Time spent outside the contact state, seconds with one decimal
    pub not_contact_duration_sec: String,
    /// Share of elapsed time spent outside the contact state, percent with one decimal
    pub not_contact_ratio: String,
    /// Share of elapsed time per configured label, percent with one decimal
    pub class_percentages: BTreeMap<Label, String>,
    /// Accumulated time per configured label (ms)
    pub class_durations: BTreeMap<Label, i64>,
}

/// Per-call output of the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Current stable (smoothed) status
    pub status: Label,
    /// Whether this call's smoothed label is the contact label
    pub is_contact: bool,
    /// Whether the dwell-time warning is active
    pub is_warning: bool,
    pub stats: SessionStats,
}
