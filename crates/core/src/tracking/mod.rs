//! Per-table change tracking.
//!
//! A [`TableTracker`] holds everything one context knows about one table: the
//! entities it loaded (snapshot as read plus the current copy), staged inserts
//! and staged removes. It works on [`Document`]s only; the typed layer converts
//! entities through their descriptors.
//!
//! State machine: `Clean -> Modified -> Committing -> (Clean | Failed)`.

mod error;

use std::collections::BTreeMap;

use crate::entity::EntityKey;
use crate::schema::KeySchema;
use crate::store::{WriteCondition, WriteRequest};
use crate::value::{Document, Value};

pub use error::{Result, SubmitError, TrackingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Clean,
    Modified,
    Committing,
    Failed,
}

/// An entity as written by a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedEntity {
    pub key: EntityKey,
    pub document: Document,
}

/// The delta a successful commit applied to one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommittedChanges {
    pub added: Vec<ChangedEntity>,
    pub modified: Vec<ChangedEntity>,
    pub removed: Vec<EntityKey>,
}

impl CommittedChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

/// Changes staged on one table and not yet committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChangeSet {
    pub inserts: Vec<Document>,
    /// `(old, new)` pairs.
    pub updates: Vec<(Document, Document)>,
    pub removes: Vec<EntityKey>,
}

impl PendingChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }
}

/// The writes for one commit and the delta they apply once accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCommit {
    pub requests: Vec<WriteRequest>,
    pub changes: CommittedChanges,
}

#[derive(Debug, Clone)]
struct Tracked {
    key: EntityKey,
    snapshot: Document,
    current: Document,
}

#[derive(Debug, Clone)]
struct StagedRemove {
    key: EntityKey,
    snapshot: Option<Document>,
}

#[derive(Debug, Clone)]
pub struct TableTracker {
    table: String,
    key_schema: KeySchema,
    version_field: Option<String>,
    loaded: BTreeMap<String, Tracked>,
    inserts: BTreeMap<String, (EntityKey, Document)>,
    removes: BTreeMap<String, StagedRemove>,
    state: TrackerState,
}

impl TableTracker {
    pub fn new(table: impl Into<String>, key_schema: KeySchema, version_field: Option<&str>) -> Self {
        Self {
            table: table.into(),
            key_schema,
            version_field: version_field.map(str::to_string),
            loaded: BTreeMap::new(),
            inserts: BTreeMap::new(),
            removes: BTreeMap::new(),
            state: TrackerState::Clean,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    fn touch(&mut self) {
        self.state = TrackerState::Modified;
    }

    /// Registers a document read from the store and returns the copy the
    /// context sees. An entity already tracked keeps its current copy.
    pub fn track_loaded(&mut self, key: EntityKey, document: Document) -> Document {
        let id = key.canonical();
        if let Some(tracked) = self.loaded.get(&id) {
            return tracked.current.clone();
        }
        if let Some((_, staged)) = self.inserts.get(&id) {
            return staged.clone();
        }
        self.loaded.insert(
            id,
            Tracked {
                key,
                snapshot: document.clone(),
                current: document.clone(),
            },
        );
        document
    }

    /// The current copy of a tracked or staged entity.
    pub fn current(&self, key: &EntityKey) -> Option<&Document> {
        let id = key.canonical();
        self.loaded
            .get(&id)
            .map(|t| &t.current)
            .or_else(|| self.inserts.get(&id).map(|(_, d)| d))
    }

    pub fn is_removed(&self, key: &EntityKey) -> bool {
        self.removes.contains_key(&key.canonical())
    }

    pub fn stage_insert(&mut self, key: EntityKey, document: Document) -> Result<()> {
        let id = key.canonical();
        if self.inserts.contains_key(&id) {
            return Err(self.duplicate(key));
        }
        if self.loaded.contains_key(&id) {
            if self.removes.remove(&id).is_none() {
                return Err(self.duplicate(key));
            }
            // Removed then re-inserted: the row still exists, so this is an
            // update of the loaded entity.
            if let Some(tracked) = self.loaded.get_mut(&id) {
                tracked.current = document;
            }
            self.touch();
            return Ok(());
        }
        self.inserts.insert(id, (key, document));
        self.touch();
        Ok(())
    }

    pub fn stage_remove(&mut self, key: EntityKey) {
        let id = key.canonical();
        self.touch();
        if self.inserts.remove(&id).is_some() {
            return;
        }
        let snapshot = self.loaded.get(&id).map(|t| t.snapshot.clone());
        self.removes.insert(id, StagedRemove { key, snapshot });
    }

    /// Replaces the current copy of a loaded entity or a staged insert.
    pub fn replace_current(&mut self, key: &EntityKey, document: Document) -> Result<()> {
        let id = key.canonical();
        if let Some(tracked) = self.loaded.get_mut(&id) {
            tracked.current = document;
        } else if let Some((_, staged)) = self.inserts.get_mut(&id) {
            *staged = document;
        } else {
            return Err(TrackingError::NotTracked {
                table: self.table.clone(),
                key: key.clone(),
            });
        }
        self.touch();
        Ok(())
    }

    fn duplicate(&self, key: EntityKey) -> TrackingError {
        TrackingError::DuplicateKey {
            table: self.table.clone(),
            key,
        }
    }

    fn updates(&self) -> impl Iterator<Item = &Tracked> {
        self.loaded
            .iter()
            .filter(|(id, t)| !self.removes.contains_key(*id) && t.current != t.snapshot)
            .map(|(_, t)| t)
    }

    pub fn pending(&self) -> PendingChangeSet {
        PendingChangeSet {
            inserts: self.inserts.values().map(|(_, d)| d.clone()).collect(),
            updates: self
                .updates()
                .map(|t| (t.snapshot.clone(), t.current.clone()))
                .collect(),
            removes: self.removes.values().map(|r| r.key.clone()).collect(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.inserts.is_empty() || !self.removes.is_empty() || self.updates().next().is_some()
    }

    /// Builds the conditional writes for every staged change and moves to
    /// `Committing`. Versions are assigned here: 1 for inserts, last seen + 1
    /// for updates.
    pub fn begin_commit(&mut self) -> Result<PreparedCommit> {
        let mut requests = Vec::new();
        let mut changes = CommittedChanges::default();

        for (key, document) in self.inserts.values() {
            let mut item = document.clone();
            let condition = match &self.version_field {
                Some(field) => {
                    item.insert(field.clone(), Value::Int(1));
                    WriteCondition::NotExists
                }
                None => WriteCondition::None,
            };
            requests.push(WriteRequest::Put {
                key: key.clone(),
                item: item.clone(),
                condition,
            });
            changes.added.push(ChangedEntity {
                key: key.clone(),
                document: item,
            });
        }

        for tracked in self.updates() {
            let current_key = self
                .key_schema
                .key_of(&self.table, &tracked.current)
                .ok()
                .filter(|k| k == &tracked.key);
            if current_key.is_none() {
                return Err(TrackingError::KeyChanged {
                    table: self.table.clone(),
                    key: tracked.key.clone(),
                });
            }

            let mut item = tracked.current.clone();
            let condition = match &self.version_field {
                Some(field) => {
                    let last = tracked.snapshot.get(field).and_then(Value::as_i64);
                    item.insert(field.clone(), Value::Int(last.unwrap_or(0) + 1));
                    match last {
                        Some(version) => WriteCondition::VersionEquals {
                            field: field.clone(),
                            version,
                        },
                        None => WriteCondition::VersionAbsent {
                            field: field.clone(),
                        },
                    }
                }
                None => WriteCondition::None,
            };
            requests.push(WriteRequest::Put {
                key: tracked.key.clone(),
                item: item.clone(),
                condition,
            });
            changes.modified.push(ChangedEntity {
                key: tracked.key.clone(),
                document: item,
            });
        }

        for staged in self.removes.values() {
            let condition = match (&self.version_field, &staged.snapshot) {
                (Some(field), Some(snapshot)) => match snapshot.get(field).and_then(Value::as_i64) {
                    Some(version) => WriteCondition::VersionEquals {
                        field: field.clone(),
                        version,
                    },
                    None => WriteCondition::VersionAbsent {
                        field: field.clone(),
                    },
                },
                _ => WriteCondition::None,
            };
            requests.push(WriteRequest::Delete {
                key: staged.key.clone(),
                condition,
            });
            changes.removed.push(staged.key.clone());
        }

        self.state = TrackerState::Committing;
        Ok(PreparedCommit { requests, changes })
    }

    /// Applies a committed delta: written documents become the new loaded
    /// snapshots and removed keys stop being tracked.
    pub fn complete_commit(&mut self, changes: &CommittedChanges) {
        for entity in changes.added.iter().chain(&changes.modified) {
            self.loaded.insert(
                entity.key.canonical(),
                Tracked {
                    key: entity.key.clone(),
                    snapshot: entity.document.clone(),
                    current: entity.document.clone(),
                },
            );
        }
        for key in &changes.removed {
            self.loaded.remove(&key.canonical());
        }
        self.inserts.clear();
        self.removes.clear();
        self.state = TrackerState::Clean;
    }

    /// Drains every pending change after a rejected commit. Loaded entities
    /// fall back to their snapshots.
    pub fn fail_commit(&mut self) -> PendingChangeSet {
        let rejected = self.pending();
        self.inserts.clear();
        self.removes.clear();
        for tracked in self.loaded.values_mut() {
            tracked.current = tracked.snapshot.clone();
        }
        self.state = TrackerState::Failed;
        rejected
    }

    /// Leaves `Committing` without changes to commit.
    pub fn reset_clean(&mut self) {
        self.state = TrackerState::Clean;
    }
}
