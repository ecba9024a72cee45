//! Persistence of the item tree
//!
//! Each item is stored as one record keyed by its encoded path. Records keep
//! the original name next to the encoded one, so name registries can be
//! rebuilt after a restart without re-encoding anything.

mod fs_store;
mod record;

pub use fs_store::FsItemStore;
pub use record::{ItemKind, ItemRecord};

use crate::Result;
use crate::model::ItemPath;

/// Storage collaborator for item records.
pub trait ItemStore: Send + Sync {
    /// Create or overwrite the record at `record.path`.
    fn save(&self, record: &ItemRecord) -> Result<()>;

    /// Remove an item and everything stored below it.
    fn remove(&self, path: &ItemPath) -> Result<()>;

    /// Records of the direct children of `parent`, or of the top-level items
    /// when `parent` is `None`.
    fn load_children(&self, parent: Option<&ItemPath>) -> Result<Vec<ItemRecord>>;
}

/// Store that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl ItemStore for NullStore {
    fn save(&self, _record: &ItemRecord) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _path: &ItemPath) -> Result<()> {
        Ok(())
    }

    fn load_children(&self, _parent: Option<&ItemPath>) -> Result<Vec<ItemRecord>> {
        Ok(Vec::new())
    }
}

/// Save a record, logging instead of failing the pass.
pub(crate) fn persist(store: &dyn ItemStore, record: &ItemRecord) {
    if let Err(e) = store.save(record) {
        tracing::warn!(item = %record.path, error = %e, "Failed to save item record");
    }
}

/// Remove a record, logging instead of failing the pass.
pub(crate) fn forget(store: &dyn ItemStore, path: &ItemPath) {
    if let Err(e) = store.remove(path) {
        tracing::warn!(item = %path, error = %e, "Failed to remove item record");
    }
}
