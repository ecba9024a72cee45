//! Indexing and reconciliation core for multi-branch projects
//!
//! Keeps a tree of organizations, multi-branch projects and branch projects
//! in step with what source-control providers report:
//!
//! - [`reconcile`] diffs discovered repositories and branches against the
//!   tree and creates, renames, revives or retires items to match.
//! - [`branding`] replaces each item's provider decorations (links,
//!   descriptions, icons) on every pass.
//! - [`cause`] merges the branch indexing cause with provider causes for
//!   every build a pass requests.
//! - [`coordinator`] turns explicit requests, periodic ticks and provider
//!   events into passes and builds, and exposes watermarks to wait on.
//!
//! Providers plug in through the [`provider::Navigator`] and
//! [`provider::Source`] traits, organizations pick which repositories become
//! projects through [`factory::ProjectFactory`], and builds run through a
//! [`build::BuildEngine`].

pub mod branding;
pub mod build;
pub mod cause;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod factory;
pub mod logging;
pub mod model;
pub mod provider;
pub mod reconcile;
pub mod store;
pub mod tree;

pub use branding::{Decoration, DecorationKind, Decorations, Icon, Link, Metadata, ObjectMetadata};
pub use build::{BuildEngine, BuildHandle, BuildRecord, BuildRequest, BuildResult, BuildStatus};
pub use cause::{Cause, CauseSet, build_causes};
pub use config::{IndexerConfig, OrphanedItemStrategy};
pub use coordinator::{Coordinator, EventKind, EventScope, ScmEvent, Watermark};
pub use error::{Error, Result};
pub use factory::{BasicProjectFactory, ProjectFactory};
pub use model::{BranchProject, ItemPath, MultiBranchProject, Organization};
pub use provider::{
    DiscoveredBranch, DiscoveredRepository, Navigator, ProviderError, ProviderResult, Revision,
    Source,
};
pub use reconcile::{ReconcileReport, Reconciler};
pub use store::{FsItemStore, ItemStore, NullStore};
pub use tree::{IndexTarget, ItemTree, ProviderResolver};
