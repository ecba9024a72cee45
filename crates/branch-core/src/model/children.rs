//! Named child collections

use std::collections::HashMap;
use std::sync::Arc;

use branch_naming::{NameEncoder, NameRegistry};

use crate::Result;

/// Children of one container, keyed by encoded name.
///
/// Iteration follows the order in which children were first added; the
/// registry maps encoded names back to original names.
#[derive(Debug)]
pub struct ChildSet<T> {
    registry: NameRegistry,
    order: Vec<String>,
    items: HashMap<String, Arc<T>>,
}

impl<T> ChildSet<T> {
    pub fn new(encoder: NameEncoder) -> Self {
        Self {
            registry: NameRegistry::new(encoder),
            order: Vec::new(),
            items: HashMap::new(),
        }
    }

    pub fn encoder(&self) -> &NameEncoder {
        self.registry.encoder()
    }

    pub fn get(&self, encoded: &str) -> Option<&Arc<T>> {
        self.items.get(encoded)
    }

    pub fn get_by_original(&self, original: &str) -> Option<&Arc<T>> {
        self.registry
            .encoded(original)
            .and_then(|encoded| self.items.get(encoded))
    }

    pub fn original_name(&self, encoded: &str) -> Option<&str> {
        self.registry.original(encoded).ok()
    }

    pub fn encoded_name(&self, original: &str) -> Option<&str> {
        self.registry.encoded(original)
    }

    /// Children in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.order.iter().filter_map(|name| self.items.get(name))
    }

    /// Encoded names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Children ordered by original name.
    pub fn sorted(&self) -> Vec<Arc<T>> {
        let mut named: Vec<(&str, &Arc<T>)> = self
            .order
            .iter()
            .filter_map(|name| {
                let original = self.registry.original(name).ok()?;
                Some((original, self.items.get(name)?))
            })
            .collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        named.into_iter().map(|(_, item)| Arc::clone(item)).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reserve an encoded name for a new child.
    pub(crate) fn register(&mut self, original: &str) -> Result<String> {
        Ok(self.registry.register(original)?)
    }

    /// Add a child under a name returned by [`ChildSet::register`] or
    /// [`ChildSet::restore`].
    pub(crate) fn insert(&mut self, encoded: String, item: Arc<T>) {
        if self.items.insert(encoded.clone(), item).is_none() {
            self.order.push(encoded);
        }
    }

    /// Re-add a persisted child under its stored encoded name.
    pub(crate) fn restore(&mut self, encoded: &str, original: &str, item: Arc<T>) -> Result<()> {
        self.registry.restore(encoded, original)?;
        self.insert(encoded.to_string(), item);
        Ok(())
    }

    /// Remove a child and release its name.
    pub(crate) fn remove(&mut self, encoded: &str) -> Option<Arc<T>> {
        let item = self.items.remove(encoded)?;
        self.order.retain(|name| name != encoded);
        self.registry.release(encoded);
        Some(item)
    }

    /// Point encoded names at new original names.
    ///
    /// All old mappings are released before any new one is registered, so
    /// children may swap names within one pass.
    pub(crate) fn rename_all(&mut self, renames: &[(String, String)]) -> Result<()> {
        for (encoded, _) in renames {
            self.registry.release(encoded);
        }
        for (encoded, new_original) in renames {
            self.registry.restore(encoded, new_original)?;
        }
        Ok(())
    }
}
