//! Git integration
//!
//! Provides functionality for:
//! - Committing a run's applied files onto a dedicated branch
//! - Pushing that branch with a request-scoped credential

pub mod operations;
pub mod publisher;

pub use operations::{BranchCommit, GitOperations};
pub use publisher::{Publisher, PublisherConfig, RepoRef};
