//! Replace-per-pass decoration propagation

use std::collections::BTreeMap;

use super::decoration::{Decoration, DecorationKind, Decorations};
use super::metadata::{DecorationFailure, Metadata};

/// Decoration kinds owned by each kind of pass.
///
/// Every kind is written by exactly one pass per item, so one pass never
/// erases what another pass attached.
pub mod scope {
    use super::DecorationKind::{self, *};

    /// An organization's own pass, for the organization itself
    pub const ORGANIZATION: &[DecorationKind] = &[OrganizationLink, ObjectMetadata, Icon];
    /// An organization's pass, for each repository project it discovered
    pub const NAVIGATED_PROJECT: &[DecorationKind] = &[ObjectMetadata, Icon];
    /// A project's own pass when the project belongs to an organization
    pub const PROJECT_SOURCES: &[DecorationKind] = &[SourceLink];
    /// A standalone project's own pass
    pub const STANDALONE_PROJECT: &[DecorationKind] = &[SourceLink, ObjectMetadata, Icon];
    /// A project's pass, for each branch it discovered
    pub const BRANCH: &[DecorationKind] = &[BranchLink, ObjectMetadata, Icon];
    /// A build record, when the build is requested
    pub const BUILD: &[DecorationKind] = &[RevisionLink];
}

/// What a propagation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationReport {
    pub attached: Vec<DecorationKind>,
    pub replaced: Vec<DecorationKind>,
    pub removed: Vec<DecorationKind>,
    pub failed: Vec<DecorationFailure>,
    /// Supplied kinds outside the pass's scope
    pub ignored: Vec<DecorationKind>,
    /// This was the item's first indexing pass
    pub first_pass: bool,
}

impl DecorationReport {
    pub fn changed(&self) -> bool {
        self.first_pass
            || !self.attached.is_empty()
            || !self.replaced.is_empty()
            || !self.removed.is_empty()
    }
}

/// Apply provider metadata to an item's decorations.
///
/// For every kind in `scope`: a supplied value attaches or replaces the
/// current one wholesale; a missing or failed value removes it. Kinds outside
/// `scope` are left untouched. The item is marked indexed, so this belongs
/// to the item's own pass only.
pub fn apply_decorations(
    target: &mut Decorations,
    scope: &[DecorationKind],
    metadata: &Metadata,
) -> DecorationReport {
    let mut report = merge_decorations(target, scope, metadata);
    report.first_pass = target.mark_indexed();
    report
}

/// Like [`apply_decorations`], for a pass that decorates an item it does not
/// index. The item's indexed flag is left as it is.
pub fn merge_decorations(
    target: &mut Decorations,
    scope: &[DecorationKind],
    metadata: &Metadata,
) -> DecorationReport {
    let mut report = DecorationReport::default();
    let mut resolved: BTreeMap<DecorationKind, Result<&Decoration, &DecorationFailure>> =
        BTreeMap::new();

    for entry in metadata.entries() {
        let (kind, value) = match entry {
            Ok(decoration) => (decoration.kind(), Ok(decoration)),
            Err(failure) => (failure.kind, Err(failure)),
        };
        if !scope.contains(&kind) {
            report.ignored.push(kind);
            continue;
        }
        resolved.entry(kind).or_insert(value);
    }

    for kind in scope {
        match resolved.get(kind) {
            Some(Ok(decoration)) => {
                let existed = target.get(*kind).is_some();
                if target.set((*decoration).clone()) {
                    if existed {
                        report.replaced.push(*kind);
                    } else {
                        report.attached.push(*kind);
                    }
                }
            }
            Some(Err(failure)) => {
                tracing::warn!(kind = %failure.kind, reason = %failure.reason, "Decoration failed to resolve");
                report.failed.push((*failure).clone());
                if target.remove(*kind) {
                    report.removed.push(*kind);
                }
            }
            None => {
                if target.remove(*kind) {
                    report.removed.push(*kind);
                }
            }
        }
    }

    report
}
