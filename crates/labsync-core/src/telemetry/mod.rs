//! Client for the remote telemetry service.
//!
//! All endpoints, wire types, and HTTP plumbing live here; the publisher
//! decides *what* to write, this module knows *how* to talk to the
//! service.

mod client;
mod types;

pub use client::TelemetryClient;
pub use types::{
    CheckStats, ImportCheckPayload, ImportCheckResource, IngestEvent, IngestOutcome,
    SensorTypePayload, SensorTypeResource, StatSample, UploadResource,
};
