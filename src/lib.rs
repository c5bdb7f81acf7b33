pub mod api;
pub mod cli;
pub mod database_ops;
pub mod env_boot;
pub mod marketplace;
pub mod orchestrator;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use orchestrator::{BulkSyncSummary, SyncOrchestrator, SyncOutcome, SyncReport};
