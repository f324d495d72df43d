//! Batch parsing and validation of sample records

use crate::error::TrackerError;
use crate::schema::record::{SampleRecord, ValidationError};

/// Adapter for parsing record batches produced by a sampling loop
pub struct SampleAdapter;

impl SampleAdapter {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<SampleRecord>, TrackerError> {
        let records: Vec<SampleRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (one record per line, blank lines ignored)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<SampleRecord>, TrackerError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SampleRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(TrackerError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate every record, returning only the failures
    pub fn validate_records(records: &[SampleRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index,
                    sample_id: record.sample_id.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A failed record and where it sits in the batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub sample_id: Option<String>,
    pub error: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NDJSON: &str = r#"
{"timestamp": 0, "predictions": [{"className": "good_posture", "probability": 0.9}]}

{"timestamp": 33, "sampleId": "f-2", "predictions": []}
{"timestamp": 66, "predictions": [{"className": "looking_away", "probability": 0.7}]}
"#;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let records = SampleAdapter::parse_ndjson(NDJSON).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].timestamp, Some(66));
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let input = "{\"predictions\": []}\nnot json\n";
        match SampleAdapter::parse_ndjson(input) {
            Err(TrackerError::ParseError(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[
            {"timestamp": 0, "predictions": [{"className": "good_posture", "probability": 0.9}]},
            {"timestamp": 10, "predictions": [{"className": "looking_down", "probability": 0.6}]}
        ]"#;
        let records = SampleAdapter::parse_array(json).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_validate_records_returns_failures_only() {
        let records = SampleAdapter::parse_ndjson(NDJSON).unwrap();
        let failures = SampleAdapter::validate_records(&records);

        assert_eq!(
            failures,
            vec![ValidationResult {
                index: 1,
                sample_id: Some("f-2".to_string()),
                error: ValidationError::EmptyPredictions,
            }]
        );
    }
}
