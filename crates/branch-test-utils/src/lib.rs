//! Shared test utilities for the branch-indexer workspace.
//!
//! Fixtures here stand in for real source-control providers and build
//! executors. Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`scm`] - [`MockScmController`] and the navigator and source over it
//! - [`engine`] - [`RecordingBuildEngine`] that records build requests
//! - [`fixture`] - [`TestIndexer`] wiring both to a coordinator

pub mod engine;
pub mod fixture;
pub mod scm;

pub use engine::RecordingBuildEngine;
pub use fixture::{TestIndexer, wait_until};
pub use scm::{MockNavigator, MockScmController, MockSource};
