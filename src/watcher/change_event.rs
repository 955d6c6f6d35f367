use std::fmt;

use serde_json::Map;
use serde_json::Value;
use tracing::warn;

use crate::Document;

/// Operation reported by the upstream change stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Insert,
    Update,
    /// Whole-document replacement, normalized to an update
    Replace,
    Delete,
}

/// Field-level description of an update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDescription {
    pub updated_fields: Map<String, Value>,
    pub removed_fields: Vec<String>,
}

/// One change exactly as the upstream delivers it
#[derive(Debug, Clone)]
pub struct RawChange<T> {
    pub operation_type: OperationType,
    pub document_key: String,
    pub full_document: Option<T>,
    pub full_document_before_change: Option<T>,
    pub update_description: Option<UpdateDescription>,
}

impl<T: Document> RawChange<T> {
    pub fn insert(doc: T) -> Self {
        Self {
            operation_type: OperationType::Insert,
            document_key: doc.id().to_string(),
            full_document: Some(doc),
            full_document_before_change: None,
            update_description: None,
        }
    }

    pub fn update(
        id: impl Into<String>,
        full_document: Option<T>,
        update_description: Option<UpdateDescription>,
    ) -> Self {
        Self {
            operation_type: OperationType::Update,
            document_key: id.into(),
            full_document,
            full_document_before_change: None,
            update_description,
        }
    }

    pub fn delete(
        id: impl Into<String>,
        before: Option<T>,
    ) -> Self {
        Self {
            operation_type: OperationType::Delete,
            document_key: id.into(),
            full_document: None,
            full_document_before_change: before,
            update_description: None,
        }
    }
}

/// Opaque upstream checkpoint
pub type ResumeToken = String;

/// Items carried by a change stream
#[derive(Debug, Clone)]
pub enum StreamItem<T> {
    Change(RawChange<T>),
    /// The upstream reached a new stable resumption point
    ResumeTokenChanged(ResumeToken),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized change consumed by the cache
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    Insert {
        doc: T,
    },
    Update {
        id: String,
        patch: Option<UpdateDescription>,
        /// Post-update document; absent when the upstream could not hydrate it
        full_doc: Option<T>,
    },
    Delete {
        id: String,
        full_doc_before_change: Option<T>,
    },
}

impl<T: Document> ChangeEvent<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Insert { doc } => doc.id(),
            ChangeEvent::Update { id, .. } => id,
            ChangeEvent::Delete { id, .. } => id,
        }
    }

    /// Returns `None` for an insert without a document body, which carries
    /// nothing the cache could apply.
    pub fn from_raw(raw: RawChange<T>) -> Option<Self> {
        match raw.operation_type {
            OperationType::Insert => match raw.full_document {
                Some(doc) => Some(ChangeEvent::Insert { doc }),
                None => {
                    warn!(id = %raw.document_key, "insert event without document body dropped");
                    None
                }
            },
            OperationType::Update | OperationType::Replace => Some(ChangeEvent::Update {
                id: raw.document_key,
                patch: raw.update_description,
                full_doc: raw.full_document,
            }),
            OperationType::Delete => Some(ChangeEvent::Delete {
                id: raw.document_key,
                full_doc_before_change: raw.full_document_before_change,
            }),
        }
    }
}
