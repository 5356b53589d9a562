//! Delivery configs, environments, and constraint state (§4.3).

pub mod repository;

use crate::artifact::ArtifactType;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    /// Declarative gates. Kept opaque: the core only reconciles membership
    /// and stores/retrieves the blob, never interprets a constraint rule.
    pub constraints: Value,
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub name: String,
    pub application: String,
    pub artifacts: Vec<(String, ArtifactType)>,
    pub environments: Vec<Environment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintState {
    pub config_name: String,
    pub env_name: String,
    pub version: String,
    pub constraint_type: String,
    pub status: String,
    pub judged_by: Option<String>,
    pub judged_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}
