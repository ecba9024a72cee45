//! Bidirectional name registry for one container of items

use std::collections::{BTreeMap, HashMap};

use crate::{Error, NameEncoder, Result};

/// Tracks which original name each encoded name belongs to.
///
/// One registry exists per container (an organization's repositories, a
/// project's branches). Encoded names are unique within it, compared
/// case-insensitively so that two items never share a directory on a
/// case-folding filesystem. When two originals would encode identically the
/// later registration gets a `.2`, `.3`, ... suffix.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    encoder: NameEncoder,
    /// encoded -> original
    by_encoded: BTreeMap<String, String>,
    /// original -> encoded
    by_original: HashMap<String, String>,
    /// lowercased encoded -> encoded
    folded: HashMap<String, String>,
}

impl NameRegistry {
    pub fn new(encoder: NameEncoder) -> Self {
        Self {
            encoder,
            ..Self::default()
        }
    }

    pub fn encoder(&self) -> &NameEncoder {
        &self.encoder
    }

    /// Register an original name and return its encoded form.
    ///
    /// Registering an already known original returns the existing encoded
    /// name unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the original cannot be encoded.
    pub fn register(&mut self, original: &str) -> Result<String> {
        if let Some(existing) = self.by_original.get(original) {
            return Ok(existing.clone());
        }

        let base = self.encoder.encode(original)?;
        let mut candidate = base.clone();
        let mut suffix = 2u32;
        while self.is_taken(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        if candidate != base {
            tracing::debug!(original, base = %base, encoded = %candidate, "Disambiguated colliding name");
        }

        self.insert(candidate.clone(), original.to_string());
        Ok(candidate)
    }

    /// Re-register a mapping loaded from storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if either side is already mapped elsewhere.
    pub fn restore(&mut self, encoded: &str, original: &str) -> Result<()> {
        match self.by_original.get(original) {
            Some(existing) if existing == encoded => return Ok(()),
            Some(existing) => {
                return Err(Error::Conflict {
                    original: original.to_string(),
                    encoded: existing.clone(),
                });
            }
            None => {}
        }
        if let Some(owner) = self.folded.get(&encoded.to_lowercase()) {
            let holder = self.by_encoded.get(owner).cloned().unwrap_or_default();
            return Err(Error::Conflict {
                original: holder,
                encoded: owner.clone(),
            });
        }

        self.insert(encoded.to_string(), original.to_string());
        Ok(())
    }

    /// Encoded name registered for an original, if any.
    pub fn encoded(&self, original: &str) -> Option<&str> {
        self.by_original.get(original).map(String::as_str)
    }

    /// Original name behind an encoded name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the encoded name is not registered.
    pub fn original(&self, encoded: &str) -> Result<&str> {
        self.by_encoded
            .get(encoded)
            .map(String::as_str)
            .ok_or_else(|| Error::NotFound {
                encoded: encoded.to_string(),
            })
    }

    /// Forget an encoded name, returning the original it mapped to.
    pub fn release(&mut self, encoded: &str) -> Option<String> {
        let original = self.by_encoded.remove(encoded)?;
        self.by_original.remove(&original);
        self.folded.remove(&encoded.to_lowercase());
        Some(original)
    }

    pub fn len(&self) -> usize {
        self.by_encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_encoded.is_empty()
    }

    /// Iterate `(encoded, original)` pairs in encoded-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_encoded
            .iter()
            .map(|(encoded, original)| (encoded.as_str(), original.as_str()))
    }

    fn is_taken(&self, encoded: &str) -> bool {
        self.folded.contains_key(&encoded.to_lowercase())
    }

    fn insert(&mut self, encoded: String, original: String) {
        self.folded.insert(encoded.to_lowercase(), encoded.clone());
        self.by_original.insert(original.clone(), encoded.clone());
        self.by_encoded.insert(encoded, original);
    }
}
