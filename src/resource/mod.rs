//! Resources and their event histories (§4.4).

pub mod repository;

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub uid: String,
    pub id: String,
    pub api_version: String,
    pub kind: String,
    pub application: String,
    pub metadata: Value,
    pub spec: Value,
}

/// Lightweight header streamed by `allResources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHeader {
    pub id: String,
    pub api_version: String,
    pub kind: String,
}

/// The per-resource projection returned by `getSummaryByApplication`.
/// `status` is left opaque here: the concrete summarization contract for a
/// given `(apiVersion, kind)` belongs to the caller's resource-type
/// collaborator, not to this core (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub id: String,
    pub kind: String,
    pub status: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub payload: Value,
    pub suppress_repeats: bool,
}
