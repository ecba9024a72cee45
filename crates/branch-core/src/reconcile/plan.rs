//! Matching discovered items against existing children

use std::collections::{HashMap, HashSet};

use branch_naming::NameEncoder;

use super::report::SkippedItem;
use crate::config::OrphanedItemStrategy;

/// An existing child as seen by the planner.
#[derive(Debug, Clone)]
pub(crate) struct ExistingChild {
    pub(crate) encoded: String,
    pub(crate) original: String,
    pub(crate) identity: Option<String>,
    pub(crate) obsolete: bool,
}

/// A discovered item as seen by the planner.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub(crate) name: &'a str,
    pub(crate) identity: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Materialize a new child for candidate `index`
    Create { index: usize },
    /// Keep the existing child for candidate `index`
    Retain {
        index: usize,
        encoded: String,
        /// Previous original name when the remote was renamed
        rename_from: Option<String>,
        /// The child was obsolete and has been rediscovered
        revive: bool,
    },
}

impl Step {
    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Create { index } | Self::Retain { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Retirement {
    pub(crate) encoded: String,
    pub(crate) original: String,
    /// Delete the child rather than mark it obsolete
    pub(crate) purge: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Plan {
    /// One step per accepted candidate, in discovery order
    pub(crate) steps: Vec<Step>,
    pub(crate) retire: Vec<Retirement>,
    pub(crate) skipped: Vec<SkippedItem>,
}

/// Decide what happens to every existing child and discovered candidate.
///
/// Candidates match an existing child by identity first. The original name
/// is used only when the candidate has no identity, or when the same-named
/// child has none. Invalid and duplicate candidates are skipped.
pub(crate) fn plan(
    existing: &[ExistingChild],
    candidates: &[Candidate<'_>],
    encoder: &NameEncoder,
    strategy: OrphanedItemStrategy,
) -> Plan {
    let by_identity: HashMap<&str, usize> = existing
        .iter()
        .enumerate()
        .filter_map(|(i, child)| child.identity.as_deref().map(|id| (id, i)))
        .collect();
    let by_name: HashMap<&str, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, child)| (child.original.as_str(), i))
        .collect();

    let mut plan = Plan::default();
    let mut matched = vec![false; existing.len()];
    let mut names: HashSet<&str> = HashSet::new();
    let mut identities: HashSet<&str> = HashSet::new();

    for (index, candidate) in candidates.iter().enumerate() {
        if let Err(e) = encoder.encode(candidate.name) {
            plan.skipped.push(SkippedItem::new(candidate.name, e.to_string()));
            continue;
        }
        if !names.insert(candidate.name) {
            plan.skipped
                .push(SkippedItem::new(candidate.name, "duplicate name"));
            continue;
        }
        if let Some(identity) = candidate.identity {
            if !identities.insert(identity) {
                names.remove(candidate.name);
                plan.skipped
                    .push(SkippedItem::new(candidate.name, "duplicate identity"));
                continue;
            }
        }

        let by_id = candidate
            .identity
            .and_then(|id| by_identity.get(id).copied())
            .filter(|&i| !matched[i]);
        let found = by_id.or_else(|| {
            by_name
                .get(candidate.name)
                .copied()
                .filter(|&i| !matched[i])
                .filter(|&i| candidate.identity.is_none() || existing[i].identity.is_none())
        });

        match found {
            Some(i) => {
                matched[i] = true;
                let child = &existing[i];
                plan.steps.push(Step::Retain {
                    index,
                    encoded: child.encoded.clone(),
                    rename_from: (child.original != candidate.name).then(|| child.original.clone()),
                    revive: child.obsolete,
                });
            }
            None => plan.steps.push(Step::Create { index }),
        }
    }

    for (i, child) in existing.iter().enumerate() {
        if matched[i] {
            continue;
        }
        let purge =
            strategy == OrphanedItemStrategy::Delete || names.contains(child.original.as_str());
        if child.obsolete && !purge {
            continue;
        }
        plan.retire.push(Retirement {
            encoded: child.encoded.clone(),
            original: child.original.clone(),
            purge,
        });
    }

    plan
}
