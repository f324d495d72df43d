//! Posture Flux - On-device posture and gaze state tracking
//!
//! Flux turns noisy per-frame classifier output into a stable, user-facing
//! state through a deterministic pipeline: sample validation → majority-vote
//! smoothing → status transition and duration accounting → dwell-time warning
//! → status update encoding.
//!
//! ## Modules
//!
//! - **Tracker**: the smoothing, hysteresis and statistics engine
//! - **Pipeline**: record parsing, encoding, state persistence and batch replay
//! - **Summary**: end-of-session figures and performance grading

pub mod config;
pub mod encoder;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod schema;
pub mod stats;
pub mod summary;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{TimestampPolicy, TrackerConfig};
pub use error::TrackerError;
pub use pipeline::{replay, replay_to_summary, PostureProcessor, StreamProcessor};
pub use summary::{PerformanceLevel, SessionSummary};
pub use tracker::{PostureStateTracker, ResetScope};
pub use types::{ClassificationSample, Label, Prediction, SessionStats, Snapshot};

// Schema exports
pub use schema::{SampleAdapter, SampleRecord, SCHEMA_VERSION};

/// Flux version embedded in every status update
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for status updates
pub const PRODUCER_NAME: &str = "posture-flux";
