//! Outcome of one indexing pass

use crate::model::ItemPath;

/// A discovered item the pass could not materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub name: String,
    pub reason: String,
}

impl SkippedItem {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub path: ItemPath,
    pub from: String,
    pub to: String,
}

/// What one pass changed below (and on) the indexed item.
///
/// Child lists hold paths of the affected children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub item: ItemPath,
    pub created: Vec<ItemPath>,
    pub renamed: Vec<Rename>,
    /// Retained children whose revision or sources changed
    pub updated: Vec<ItemPath>,
    /// Children deleted
    pub retired: Vec<ItemPath>,
    /// Children kept but marked obsolete
    pub obsoleted: Vec<ItemPath>,
    pub revived: Vec<ItemPath>,
    pub skipped: Vec<SkippedItem>,
    /// Items (the indexed item included) whose decorations changed
    pub decorated: Vec<ItemPath>,
    /// Branches a build was queued for
    pub builds: Vec<ItemPath>,
    /// The item was deleted before the pass could apply anything
    pub aborted: bool,
}

impl ReconcileReport {
    pub fn new(item: ItemPath) -> Self {
        Self {
            item,
            created: Vec::new(),
            renamed: Vec::new(),
            updated: Vec::new(),
            retired: Vec::new(),
            obsoleted: Vec::new(),
            revived: Vec::new(),
            skipped: Vec::new(),
            decorated: Vec::new(),
            builds: Vec::new(),
            aborted: false,
        }
    }

    pub(crate) fn aborted(item: ItemPath) -> Self {
        Self {
            aborted: true,
            ..Self::new(item)
        }
    }

    /// True when the pass mutated nothing.
    ///
    /// Skipped items are reported but are not mutations.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.renamed.is_empty()
            && self.updated.is_empty()
            && self.retired.is_empty()
            && self.obsoleted.is_empty()
            && self.revived.is_empty()
            && self.decorated.is_empty()
            && self.builds.is_empty()
    }

    pub(crate) fn log(&self) {
        if self.aborted {
            tracing::debug!(item = %self.item, "Indexing pass skipped, item deleted");
            return;
        }
        for skipped in &self.skipped {
            tracing::warn!(item = %self.item, name = %skipped.name, reason = %skipped.reason, "Skipped discovered item");
        }
        tracing::info!(
            item = %self.item,
            created = self.created.len(),
            renamed = self.renamed.len(),
            updated = self.updated.len(),
            retired = self.retired.len(),
            obsoleted = self.obsoleted.len(),
            revived = self.revived.len(),
            builds = self.builds.len(),
            "Indexing pass finished"
        );
    }
}
