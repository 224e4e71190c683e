//! Fix run orchestration

pub mod orchestrator;
pub mod state;

pub use orchestrator::{final_state, new_run_id, Pipeline, RunOptions};
pub use state::RunLifecycle;
