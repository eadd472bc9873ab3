use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::coerce::DesiredStateEntry;
use crate::schema::{ValueKind, MAX_BATCH, NAMESPACE};
use crate::shop::RemoteMetafield;

/// One field as it currently exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStateEntry {
    pub key: String,
    /// `None` when only the remote handle is known (id-map input).
    pub value: Option<String>,
    pub remote_id: Option<String>,
}

/// Remote fields keyed by metafield key, fetched fresh for every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    entries: BTreeMap<String, RemoteStateEntry>,
}

impl RemoteState {
    /// Build from fetched metafields. Only the managed namespace is kept.
    pub fn from_metafields(metafields: &[RemoteMetafield]) -> Self {
        let entries = metafields
            .iter()
            .filter(|m| m.namespace == NAMESPACE)
            .map(|m| {
                let entry = RemoteStateEntry {
                    key: m.key.clone(),
                    value: Some(m.value.clone()),
                    remote_id: Some(m.id.clone()),
                };
                (m.key.clone(), entry)
            })
            .collect();
        Self { entries }
    }

    /// Build from a `{key: remote_id}` mapping. Values are unknown, so every
    /// mapped field is rewritten.
    pub fn from_id_map(ids: &BTreeMap<String, String>) -> Self {
        let entries = ids
            .iter()
            .map(|(key, id)| {
                let entry = RemoteStateEntry {
                    key: key.clone(),
                    value: None,
                    remote_id: Some(id.clone()),
                };
                (key.clone(), entry)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&RemoteStateEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record writes that succeeded so a later diff sees them.
    pub fn apply(&mut self, ops: &[WriteOperation]) {
        for op in ops {
            let entry = self
                .entries
                .entry(op.key().to_string())
                .or_insert_with(|| RemoteStateEntry {
                    key: op.key().to_string(),
                    value: None,
                    remote_id: None,
                });
            entry.value = Some(op.value().to_string());
            if let WriteOperation::Update { remote_id, .. } = op {
                entry.remote_id = Some(remote_id.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOperation {
    Create {
        key: String,
        kind: ValueKind,
        value: String,
    },
    Update {
        remote_id: String,
        key: String,
        kind: ValueKind,
        value: String,
    },
}

impl WriteOperation {
    pub fn key(&self) -> &str {
        match self {
            WriteOperation::Create { key, .. } | WriteOperation::Update { key, .. } => key,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            WriteOperation::Create { kind, .. } | WriteOperation::Update { kind, .. } => *kind,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            WriteOperation::Create { value, .. } | WriteOperation::Update { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Remote already matches; nothing to send.
    NoOp,
    Writes(Vec<WriteOperation>),
}

impl Reconciliation {
    pub fn operations(&self) -> &[WriteOperation] {
        match self {
            Reconciliation::NoOp => &[],
            Reconciliation::Writes(ops) => ops,
        }
    }

    /// Operations grouped for the batch writer, at most [`MAX_BATCH`] each.
    pub fn batches(&self) -> std::slice::Chunks<'_, WriteOperation> {
        self.operations().chunks(MAX_BATCH)
    }
}

/// Diff desired against remote state. Fields missing from `desired` are
/// never touched; the output keeps the order of `desired`.
pub fn reconcile(desired: &[DesiredStateEntry], remote: &RemoteState) -> Reconciliation {
    let mut ops = Vec::new();

    for entry in desired {
        let value = entry.value.to_remote();
        match remote.get(entry.key) {
            None => ops.push(WriteOperation::Create {
                key: entry.key.to_string(),
                kind: entry.kind,
                value,
            }),
            Some(RemoteStateEntry {
                value: Some(current),
                ..
            }) if entry.value.matches_remote(current) => {
                debug!(key = entry.key, "unchanged");
            }
            Some(existing) => match &existing.remote_id {
                Some(remote_id) => ops.push(WriteOperation::Update {
                    remote_id: remote_id.clone(),
                    key: entry.key.to_string(),
                    kind: entry.kind,
                    value,
                }),
                None => ops.push(WriteOperation::Create {
                    key: entry.key.to_string(),
                    kind: entry.kind,
                    value,
                }),
            },
        }
    }

    if ops.is_empty() {
        Reconciliation::NoOp
    } else {
        Reconciliation::Writes(ops)
    }
}
