//! Research pipeline services
//!
//! Collaborator seams (harvester, contact sink), progress publishing, the
//! active run registry and the search orchestrator that ties them together.

pub mod harvester;
pub mod publisher;
pub mod registry;
pub mod search_orchestrator;
pub mod sink;

pub use harvester::{ContentHarvester, HarvestError, HarvesterConfig, HttpHarvester};
pub use publisher::ProgressPublisher;
pub use registry::{AlreadyRunning, RunGuard, SearchRegistry};
pub use search_orchestrator::{
    OrchestratorConfig, RunPlan, RunResults, RunStats, SearchError, SearchOrchestrator,
};
pub use sink::{ContactSink, SqliteContactSink};
