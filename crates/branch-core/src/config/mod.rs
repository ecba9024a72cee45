//! Indexer configuration
//!
//! Settings are read from a TOML file. Every field has a default, so an
//! empty file (or no file at all, via [`IndexerConfig::default`]) is valid:
//!
//! ```toml
//! [indexing]
//! workers = 4
//! tick_interval_secs = 300
//! orphaned_items = "delete"   # or "mark-obsolete"
//!
//! [builds]
//! executors = 2
//! build_on_create = true
//!
//! [naming]
//! max_safe_length = 32
//! ```

mod settings;

pub use settings::{
    BuildSettings, IndexerConfig, IndexingSettings, NamingSettings, OrphanedItemStrategy,
};
