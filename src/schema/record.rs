//! posture.sample.v1 record definition
//!
//! One record per classified frame: the classifier's `(className, probability)`
//! pairs plus the capture timestamp in milliseconds.

use crate::error::TrackerError;
use crate::types::{ClassificationSample, Prediction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current record schema version
pub const SCHEMA_VERSION: &str = "posture.sample.v1";

/// A single classifier output as produced by the sampling loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPrediction {
    #[serde(alias = "label")]
    pub class_name: String,
    pub probability: f64,
}

/// One classified frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    /// Schema version, `posture.sample.v1` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Producer-assigned identifier, used only for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
    /// Capture time (ms since epoch). Missing timestamps are stamped on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub predictions: Vec<RawPrediction>,
}

impl SampleRecord {
    pub fn new(timestamp: i64, predictions: Vec<RawPrediction>) -> Self {
        Self {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            sample_id: None,
            timestamp: Some(timestamp),
            predictions,
        }
    }

    /// Validate the record without converting it
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(ValidationError::InvalidSchemaVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: version.clone(),
                });
            }
        }

        if let Some(ts) = self.timestamp {
            if ts < 0 {
                return Err(ValidationError::NegativeTimestamp(ts));
            }
        }

        if self.predictions.is_empty() {
            return Err(ValidationError::EmptyPredictions);
        }

        for (index, prediction) in self.predictions.iter().enumerate() {
            if prediction.class_name.trim().is_empty() {
                return Err(ValidationError::EmptyClassName { index });
            }
            let p = prediction.probability;
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(ValidationError::ProbabilityOutOfRange {
                    class_name: prediction.class_name.clone(),
                    value: p,
                });
            }
        }

        Ok(())
    }

    /// Convert into a validated [`ClassificationSample`]
    pub fn to_sample(&self) -> Result<ClassificationSample, TrackerError> {
        self.validate()
            .map_err(|e| TrackerError::InvalidInput(e.to_string()))?;
        let predictions = self
            .predictions
            .iter()
            .map(|p| Prediction::new(p.class_name.as_str(), p.probability))
            .collect::<Result<Vec<_>, _>>()?;
        ClassificationSample::new(predictions)
    }
}

/// Record validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Record has no predictions")]
    EmptyPredictions,

    #[error("Prediction {index} has an empty className")]
    EmptyClassName { index: usize },

    #[error("Probability for '{class_name}' must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { class_name: String, value: f64 },

    #[error("Timestamp must not be negative, got {0}")]
    NegativeTimestamp(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prediction(class_name: &str, probability: f64) -> RawPrediction {
        RawPrediction {
            class_name: class_name.to_string(),
            probability,
        }
    }

    #[test]
    fn test_parse_classifier_output() {
        let json = r#"{
            "timestamp": 1700000000000,
            "predictions": [
                {"className": "good_posture", "probability": 0.82},
                {"className": "looking_away", "probability": 0.11},
                {"className": "looking_down", "probability": 0.07}
            ]
        }"#;

        let record: SampleRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().is_ok());
        assert_eq!(record.timestamp, Some(1_700_000_000_000));

        let sample = record.to_sample().unwrap();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.top_label().as_str(), "good_posture");
    }

    #[test]
    fn test_label_alias_accepted() {
        let json = r#"{"predictions": [{"label": "looking_down", "probability": 1.0}]}"#;
        let record: SampleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.predictions[0].class_name, "looking_down");
        assert_eq!(record.timestamp, None);
    }

    #[test]
    fn test_empty_predictions_rejected() {
        let record = SampleRecord::new(0, vec![]);
        assert_eq!(record.validate(), Err(ValidationError::EmptyPredictions));
        assert!(matches!(record.to_sample(), Err(TrackerError::InvalidInput(_))));
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let record = SampleRecord::new(0, vec![prediction("good_posture", 1.2)]);
        assert!(matches!(
            record.validate(),
            Err(ValidationError::ProbabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn test_wrong_schema_version_rejected() {
        let mut record = SampleRecord::new(0, vec![prediction("good_posture", 0.5)]);
        record.schema_version = Some("posture.sample.v0".to_string());
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let record = SampleRecord::new(-1, vec![prediction("good_posture", 0.5)]);
        assert_eq!(record.validate(), Err(ValidationError::NegativeTimestamp(-1)));
    }
}
