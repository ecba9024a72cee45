//! Provider-supplied decoration values for one pass

use super::decoration::{Decoration, DecorationKind};

/// A decoration kind the provider failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationFailure {
    pub kind: DecorationKind,
    pub reason: String,
}

impl DecorationFailure {
    pub fn new(kind: DecorationKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Everything a provider returned for one item in one pass.
///
/// Entries are either resolved decorations or per-kind failures. When a kind
/// appears more than once the first entry wins, so metadata from a primary
/// source takes precedence over later sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<Result<Decoration, DecorationFailure>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata in which every listed kind failed to resolve.
    pub fn failed(kinds: &[DecorationKind], reason: &str) -> Self {
        Self {
            entries: kinds
                .iter()
                .map(|kind| Err(DecorationFailure::new(*kind, reason)))
                .collect(),
        }
    }

    pub fn with(mut self, decoration: Decoration) -> Self {
        self.push(decoration);
        self
    }

    pub fn with_failure(mut self, kind: DecorationKind, reason: impl Into<String>) -> Self {
        self.push_failure(kind, reason);
        self
    }

    pub fn push(&mut self, decoration: Decoration) {
        self.entries.push(Ok(decoration));
    }

    pub fn push_failure(&mut self, kind: DecorationKind, reason: impl Into<String>) {
        self.entries
            .push(Err(DecorationFailure::new(kind, reason)));
    }

    /// Append another provider's entries after this one's.
    pub fn extend(&mut self, other: Metadata) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Result<Decoration, DecorationFailure>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Decoration> for Metadata {
    fn from_iter<I: IntoIterator<Item = Decoration>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Ok).collect(),
        }
    }
}
