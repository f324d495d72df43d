//! Pipeline orchestration
//!
//! This module provides the public API for turning sample records into status
//! updates: record JSON → validation → tracker → encoder → status JSON.

use crate::config::TrackerConfig;
use crate::encoder::{SnapshotEncoder, StatusUpdate};
use crate::error::TrackerError;
use crate::schema::{SampleAdapter, SampleRecord};
use crate::summary::SessionSummary;
use crate::tracker::{now_ms, PostureStateTracker, ResetScope};
use crate::types::SessionStats;

/// Result of feeding a whole batch through a fresh tracker
#[derive(Debug, Clone)]
pub struct Replay {
    pub updates: Vec<StatusUpdate>,
    pub summary: SessionSummary,
}

/// Feed a batch of records through a fresh tracker (stateless, one-shot).
///
/// The session is anchored at the first record's timestamp and ends at the
/// last one.
pub fn replay(records: &[SampleRecord], config: TrackerConfig) -> Result<Replay, TrackerError> {
    if records.is_empty() {
        return Err(TrackerError::InvalidInput(
            "no sample records to replay".to_string(),
        ));
    }

    let mut stream = StreamProcessor::new(config)?;
    let mut updates = Vec::with_capacity(records.len());
    for record in records {
        updates.push(stream.process_record(record)?);
    }

    let summary = stream
        .summary()
        .ok_or_else(|| TrackerError::InvalidInput("no sample records to replay".to_string()))?;
    Ok(Replay { updates, summary })
}

/// Replay NDJSON records and return the session summary as JSON
///
/// # Example
/// ```ignore
/// let summary_json = replay_to_summary(ndjson, TrackerConfig::default())?;
/// ```
pub fn replay_to_summary(ndjson: &str, config: TrackerConfig) -> Result<String, TrackerError> {
    let records = SampleAdapter::parse_ndjson(ndjson)?;
    let replay = replay(&records, config)?;
    serde_json::to_string_pretty(&replay.summary).map_err(TrackerError::JsonError)
}

/// Stateful processor for a live session.
///
/// Owns one tracker and one encoder; feed it records in arrival order.
pub struct PostureProcessor {
    tracker: PostureStateTracker,
    encoder: SnapshotEncoder,
}

impl PostureProcessor {
    /// Create a processor whose session starts now
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        Self::starting_at(config, now_ms())
    }

    /// Create a processor whose session starts at `start_ms`
    pub fn starting_at(config: TrackerConfig, start_ms: i64) -> Result<Self, TrackerError> {
        Ok(Self {
            tracker: PostureStateTracker::starting_at(config, start_ms)?,
            encoder: SnapshotEncoder::new(),
        })
    }

    /// Wrap an existing tracker, e.g. one restored from saved state
    pub fn from_tracker(tracker: PostureStateTracker) -> Self {
        Self {
            tracker,
            encoder: SnapshotEncoder::new(),
        }
    }

    /// Process one record given as JSON and return the status update JSON
    pub fn process(&mut self, record_json: &str) -> Result<String, TrackerError> {
        let record: SampleRecord = serde_json::from_str(record_json)
            .map_err(|e| TrackerError::ParseError(e.to_string()))?;
        let update = self.process_record(&record)?;
        serde_json::to_string(&update).map_err(|e| TrackerError::EncodingError(e.to_string()))
    }

    /// Process one parsed record. Records without a timestamp are stamped now.
    pub fn process_record(&mut self, record: &SampleRecord) -> Result<StatusUpdate, TrackerError> {
        let sample = record.to_sample()?;
        let timestamp = record.timestamp.unwrap_or_else(now_ms);
        let snapshot = self.tracker.process(&sample, timestamp);
        Ok(self.encoder.encode(snapshot, timestamp))
    }

    pub fn stats(&self) -> SessionStats {
        self.tracker.stats()
    }

    pub fn stats_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(&self.tracker.stats())?)
    }

    /// Summarize the session as of `ended_at_ms`
    pub fn summary(&self, ended_at_ms: i64) -> SessionSummary {
        SessionSummary::from_tracker(&self.tracker, ended_at_ms)
    }

    pub fn summary_json(&self, ended_at_ms: i64) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(&self.summary(ended_at_ms))?)
    }

    /// Reset anchored at the current wall-clock time
    pub fn reset(&mut self, scope: ResetScope) {
        self.tracker.reset_at(now_ms(), scope);
    }

    pub fn reset_at(&mut self, now_ms: i64, scope: ResetScope) {
        self.tracker.reset_at(now_ms, scope);
    }

    /// Save the full tracker state to JSON for persistence
    pub fn save_state(&self) -> Result<String, TrackerError> {
        self.tracker
            .to_json()
            .map_err(|e| TrackerError::EncodingError(e.to_string()))
    }

    /// Replace the tracker with previously saved state
    pub fn load_state(&mut self, json: &str) -> Result<(), TrackerError> {
        self.tracker = PostureStateTracker::from_json(json)?;
        Ok(())
    }

    pub fn tracker(&self) -> &PostureStateTracker {
        &self.tracker
    }
}

/// Processor for a stream whose records carry their own clock.
///
/// The session starts at the first valid record's timestamp rather than at
/// construction, so recorded and relative-time streams summarize correctly.
pub struct StreamProcessor {
    config: TrackerConfig,
    processor: Option<PostureProcessor>,
    last_timestamp: Option<i64>,
}

impl StreamProcessor {
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            config,
            processor: None,
            last_timestamp: None,
        })
    }

    /// Continue a session from saved tracker state. The saved configuration
    /// is used as-is.
    pub fn resume(state_json: &str) -> Result<Self, TrackerError> {
        let tracker = PostureStateTracker::from_json(state_json)?;
        Ok(Self {
            config: tracker.config().clone(),
            processor: Some(PostureProcessor::from_tracker(tracker)),
            last_timestamp: None,
        })
    }

    pub fn process_record(&mut self, record: &SampleRecord) -> Result<StatusUpdate, TrackerError> {
        let processor = match self.processor.take() {
            Some(processor) => processor,
            None => {
                // a rejected record must not anchor the session
                record
                    .validate()
                    .map_err(|e| TrackerError::InvalidInput(e.to_string()))?;
                let start_ms = record.timestamp.unwrap_or_else(now_ms);
                log::debug!("session anchored at {start_ms}");
                PostureProcessor::starting_at(self.config.clone(), start_ms)?
            }
        };

        let processor = self.processor.insert(processor);
        let update = processor.process_record(record)?;
        self.last_timestamp = Some(update.timestamp);
        Ok(update)
    }

    /// Summary ending at the last processed record, or now if nothing was
    /// processed since resuming. `None` until the session has started.
    pub fn summary(&self) -> Option<SessionSummary> {
        let processor = self.processor.as_ref()?;
        Some(processor.summary(self.last_timestamp.unwrap_or_else(now_ms)))
    }

    pub fn processor(&self) -> Option<&PostureProcessor> {
        self.processor.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::PerformanceLevel;
    use crate::types::Label;
    use pretty_assertions::assert_eq;

    fn record_json(timestamp: i64, top: &str) -> String {
        let labels = ["good_posture", "looking_away", "looking_down"];
        let predictions: Vec<String> = labels
            .iter()
            .map(|label| {
                let p = if *label == top { 0.8 } else { 0.1 };
                format!(r#"{{"className": "{label}", "probability": {p}}}"#)
            })
            .collect();
        format!(
            r#"{{"timestamp": {timestamp}, "predictions": [{}]}}"#,
            predictions.join(",")
        )
    }

    fn session_ndjson() -> String {
        [
            record_json(0, "good_posture"),
            record_json(3_000, "good_posture"),
            record_json(6_000, "looking_away"),
            record_json(7_000, "looking_away"),
            record_json(8_000, "looking_away"),
            record_json(9_000, "good_posture"),
            record_json(10_000, "good_posture"),
        ]
        .join("\n")
    }

    #[test]
    fn test_processor_emits_status_updates() {
        let config = TrackerConfig::default().with_history_size(1);
        let mut processor = PostureProcessor::starting_at(config, 0).unwrap();

        processor.process(&record_json(0, "looking_away")).unwrap();
        let json = processor.process(&record_json(2_000, "looking_away")).unwrap();
        let update: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(update["status"], "looking_away");
        assert_eq!(update["isWarning"], true);
        assert_eq!(update["timestamp"], 2_000);
        assert_eq!(update["producer"]["name"], "posture-flux");
    }

    #[test]
    fn test_processor_rejects_empty_predictions() {
        let mut processor = PostureProcessor::starting_at(TrackerConfig::default(), 0).unwrap();
        let result = processor.process(r#"{"timestamp": 10, "predictions": []}"#);
        assert!(matches!(result, Err(TrackerError::InvalidInput(_))));
        // Rejected input leaves the tracker untouched
        assert!(processor.tracker().history().is_empty());
    }

    #[test]
    fn test_processor_rejects_malformed_json() {
        let mut processor = PostureProcessor::starting_at(TrackerConfig::default(), 0).unwrap();
        assert!(matches!(
            processor.process("not json"),
            Err(TrackerError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_timestamp_is_stamped() {
        let mut processor = PostureProcessor::new(TrackerConfig::default()).unwrap();
        let before = now_ms();
        let update = processor
            .process_record(
                &serde_json::from_str(
                    r#"{"predictions": [{"className": "good_posture", "probability": 1.0}]}"#,
                )
                .unwrap(),
            )
            .unwrap();
        assert!(update.timestamp >= before);
    }

    #[test]
    fn test_save_and_load_state() {
        let config = TrackerConfig::default().with_history_size(1);
        let mut processor = PostureProcessor::starting_at(config.clone(), 0).unwrap();
        processor.process(&record_json(0, "good_posture")).unwrap();
        processor.process(&record_json(500, "looking_down")).unwrap();

        let saved = processor.save_state().unwrap();

        let mut restored = PostureProcessor::starting_at(TrackerConfig::default(), 0).unwrap();
        restored.load_state(&saved).unwrap();

        assert_eq!(restored.tracker().config(), &config);
        assert_eq!(restored.stats(), processor.stats());
        assert_eq!(
            restored.tracker().current_status(),
            &Label::from("looking_down")
        );
    }

    #[test]
    fn test_load_state_rejects_garbage() {
        let mut processor = PostureProcessor::starting_at(TrackerConfig::default(), 0).unwrap();
        assert!(processor.load_state("{}").is_err());
    }

    #[test]
    fn test_replay_summary() {
        let config = TrackerConfig::default().with_history_size(1);
        let records = SampleAdapter::parse_ndjson(&session_ndjson()).unwrap();
        let replay = replay(&records, config).unwrap();

        assert_eq!(replay.updates.len(), 7);
        // Deltas ending at 6000, 7000 and 8000 land on looking_away: 5000 of 10000 ms
        assert_eq!(replay.summary.not_contact_ratio, "50.0");
        assert_eq!(replay.summary.not_contact_count, 1);
        assert_eq!(replay.summary.duration_sec, 10);
        assert_eq!(replay.summary.performance, PerformanceLevel::Poor);
        assert!(replay.updates[4].snapshot.is_warning);
        assert!(!replay.updates[5].snapshot.is_warning);
    }

    #[test]
    fn test_replay_to_summary_json() {
        let json = replay_to_summary(&session_ndjson(), TrackerConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["notContactRatio"].is_string());
        assert!(value["performance"].is_string());
        assert_eq!(value["durationSec"], 10);
    }

    #[test]
    fn test_replay_requires_records() {
        let result = replay_to_summary("\n\n", TrackerConfig::default());
        assert!(matches!(result, Err(TrackerError::InvalidInput(_))));
    }

    fn parse(json: &str) -> SampleRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_stream_session_starts_at_first_record() {
        let mut stream = StreamProcessor::new(TrackerConfig::default()).unwrap();
        assert!(stream.summary().is_none());

        for (ts, top) in [(0, "good_posture"), (5_000, "looking_away"), (10_000, "looking_away")] {
            stream.process_record(&parse(&record_json(ts, top))).unwrap();
        }

        let summary = stream.summary().unwrap();
        assert_eq!(summary.duration_sec, 10);
        assert_eq!(
            summary.ended_at.map(|t| t.timestamp_millis()),
            Some(10_000)
        );
        assert_eq!(stream.processor().unwrap().tracker().session_start_ms(), 0);
    }

    #[test]
    fn test_stream_rejected_record_does_not_anchor() {
        let mut stream = StreamProcessor::new(TrackerConfig::default()).unwrap();
        let result = stream.process_record(&parse(r#"{"timestamp": 0, "predictions": []}"#));
        assert!(matches!(result, Err(TrackerError::InvalidInput(_))));
        assert!(stream.processor().is_none());

        stream.process_record(&parse(&record_json(5_000, "good_posture"))).unwrap();
        stream.process_record(&parse(&record_json(10_000, "good_posture"))).unwrap();

        assert_eq!(stream.summary().unwrap().duration_sec, 5);
    }

    #[test]
    fn test_stream_resume_keeps_saved_session() {
        let config = TrackerConfig::default().with_history_size(1);
        let mut stream = StreamProcessor::new(config.clone()).unwrap();
        stream.process_record(&parse(&record_json(1_000, "good_posture"))).unwrap();
        stream.process_record(&parse(&record_json(4_000, "looking_down"))).unwrap();
        let saved = stream.processor().unwrap().save_state().unwrap();

        let mut resumed = StreamProcessor::resume(&saved).unwrap();
        resumed.process_record(&parse(&record_json(11_000, "looking_down"))).unwrap();

        let tracker = resumed.processor().unwrap().tracker();
        assert_eq!(tracker.config(), &config);
        assert_eq!(tracker.session_start_ms(), 1_000);
        assert_eq!(resumed.summary().unwrap().duration_sec, 10);
    }

    #[test]
    fn test_stream_rejects_invalid_config() {
        let config = TrackerConfig::default().with_history_size(0);
        assert!(matches!(
            StreamProcessor::new(config),
            Err(TrackerError::InvalidConfig(_))
        ));
    }
}
