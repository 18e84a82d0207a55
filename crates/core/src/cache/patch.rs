//! Applying a committed delta to a cached index.
//!
//! An index is patched only when membership and position of every changed
//! row can be decided from the row itself and the cached rows around it.
//! Anything else discards the index.

use std::collections::HashMap;

use super::CacheQuery;
use crate::entity::EntityKey;
use crate::tracking::{ChangedEntity, CommittedChanges};
use crate::value::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    /// No changed row touches the index.
    Unchanged,
    Patched(Vec<EntityKey>),
    Discard,
}

/// Patches `keys`, the cached result of `query`, with a committed delta.
///
/// For ordered queries `documents` must hold the current document of every
/// key in `keys` that the delta leaves in place. A missing document discards
/// the index.
pub fn patch_index(
    query: &CacheQuery,
    keys: &[EntityKey],
    changes: &CommittedChanges,
    documents: &HashMap<EntityKey, Document>,
) -> PatchOutcome {
    if changes.is_empty() {
        return PatchOutcome::Unchanged;
    }
    if !query.is_patchable() {
        return PatchOutcome::Discard;
    }

    let mut patched: Vec<EntityKey> = keys.to_vec();
    let mut touched = false;

    if query.order_by.is_some() {
        // Take every changed row out first so the rest stays sorted while
        // the matching ones are inserted back.
        let before = patched.len();
        patched.retain(|k| !changes.removed.contains(k) && !changed_entities(changes).any(|c| c.key == *k));
        touched = patched.len() != before;

        for entity in changed_entities(changes) {
            match query.evaluate(&entity.document) {
                None => return PatchOutcome::Discard,
                Some(false) => {}
                Some(true) => {
                    let lookup = |key: &EntityKey| {
                        changed_entities(changes)
                            .find(|c| c.key == *key)
                            .map(|c| &c.document)
                            .or_else(|| documents.get(key))
                    };
                    match insertion_point(query, &patched, &entity.document, lookup) {
                        Some(at) => patched.insert(at, entity.key.clone()),
                        None => return PatchOutcome::Discard,
                    }
                    touched = true;
                }
            }
        }
    } else {
        for key in &changes.removed {
            if let Some(pos) = patched.iter().position(|k| k == key) {
                patched.remove(pos);
                touched = true;
            }
        }

        for entity in changed_entities(changes) {
            let position = patched.iter().position(|k| *k == entity.key);
            match (query.evaluate(&entity.document), position) {
                (None, _) => return PatchOutcome::Discard,
                (Some(false), Some(pos)) => {
                    patched.remove(pos);
                    touched = true;
                }
                (Some(false), None) => {}
                // Unordered rows keep their place.
                (Some(true), Some(_)) => touched = true,
                (Some(true), None) => {
                    patched.push(entity.key.clone());
                    touched = true;
                }
            }
        }
    }

    if touched {
        PatchOutcome::Patched(patched)
    } else {
        PatchOutcome::Unchanged
    }
}

fn changed_entities(changes: &CommittedChanges) -> impl Iterator<Item = &ChangedEntity> {
    changes.added.iter().chain(changes.modified.iter())
}

/// First position whose row sorts strictly after `document`, so equal rows
/// keep their relative order.
fn insertion_point<'a>(
    query: &CacheQuery,
    keys: &[EntityKey],
    document: &Document,
    lookup: impl Fn(&EntityKey) -> Option<&'a Document>,
) -> Option<usize> {
    for (i, key) in keys.iter().enumerate() {
        let existing = lookup(key)?;
        if query.compare(existing, document)?.is_gt() {
            return Some(i);
        }
    }
    Some(keys.len())
}
