//! posture.sample.v1 input schema
//!
//! This module defines the record a sampling loop (camera + classifier) emits
//! for every classified frame, and the adapter used to parse batches of them.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
