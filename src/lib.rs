//! A declarative reconciliation engine for a distributed analytics
//! cluster: given a desired-state spec and the platform's observed
//! state, drive the gap closed one reconcile tick at a time.

pub mod build;
pub mod component;
pub mod condition;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod live_client;
pub mod observed;
pub mod orchestrator;
pub mod platform;
pub mod spec;
pub mod state;
pub mod step;

pub use build::{build_components, BuiltComponents};
pub use config::OrchestratorConfig;
pub use error::{ReconcileError, Result};
pub use orchestrator::Orchestrator;
