//! Category records

use serde::{Deserialize, Serialize};

use super::{Entity, LocalId, RemoteRef};
use crate::shared::error::SyncResult;
use crate::store::Document;

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: LocalId,
    pub remote_ref: RemoteRef,
    pub name: String,
    /// Display color, `#rrggbb`
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }

    /// Categories created for an owner that has none yet
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Electrónica", "#3b82f6"),
            Self::new("Ropa", "#ec4899"),
            Self::new("Hogar", "#fb923c"),
            Self::new("Gaming", "#a855f7"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Entity for Category {
    type Draft = CategoryDraft;
    type Patch = CategoryPatch;

    const COLLECTION: &'static str = "categorias";

    fn local_id(&self) -> LocalId {
        self.id
    }

    fn remote_ref(&self) -> &RemoteRef {
        &self.remote_ref
    }

    fn from_document(local_id: LocalId, document: &Document) -> SyncResult<Self> {
        let draft: CategoryDraft = document.decode()?;
        Ok(Self {
            id: local_id,
            remote_ref: document.remote_ref.clone(),
            name: draft.name,
            color: draft.color,
        })
    }

    fn apply_patch(&mut self, patch: &CategoryPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
    }
}
