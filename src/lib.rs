//! Persistence and promotion core for a continuous-delivery control plane:
//! artifact registration and version ordering, per-environment promotion
//! state, delivery-config storage, and a resource repository with a
//! periodic-check claim protocol.
//!
//! HTTP surface, YAML loading, job orchestration, auth, and the concrete
//! SQL dialect choice are deliberately out of scope — see DESIGN.md.

pub mod artifact;
pub mod clock;
pub mod db;
pub mod delivery_config;
pub mod dispatch;
pub mod error;
pub mod periodic;
pub mod resource;
pub mod version;

pub use artifact::repository::ArtifactRepository;
pub use clock::{Clock, FixedClock, SystemClock};
pub use db::{open_pool, ConnectionPool};
pub use delivery_config::repository::DeliveryConfigRepository;
pub use error::{CoreError, CoreResult};
pub use resource::repository::ResourceRepository;

use std::sync::Arc;

/// Opens the three repositories against a shared pool, wired to the same
/// clock. The natural construction point for a caller wiring this crate
/// into a binary: `Core::open(":memory:", Arc::new(SystemClock))`.
pub struct Core {
    pub artifacts: ArtifactRepository,
    pub delivery_configs: DeliveryConfigRepository,
    pub resources: ResourceRepository,
}

impl Core {
    pub fn open(path: &str, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let pool = open_pool(path)?;
        Ok(Self {
            artifacts: ArtifactRepository::new(pool.clone(), clock.clone()),
            delivery_configs: DeliveryConfigRepository::new(pool.clone(), clock.clone()),
            resources: ResourceRepository::new(pool, clock),
        })
    }
}
