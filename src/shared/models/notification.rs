//! Notification records pushed through the realtime window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, LocalId, RemoteRef};
use crate::shared::error::SyncResult;
use crate::store::Document;

/// Notification type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[serde(rename = "producto_agregado")]
    ProductAdded,
    #[serde(rename = "stock_bajo")]
    LowStock,
    #[serde(rename = "producto_editado")]
    ProductEdited,
    #[serde(rename = "producto_eliminado")]
    ProductRemoved,
    Info,
    Warning,
}

impl NotificationKind {
    /// Wire name; unknown names read back as `Info`
    pub fn from_wire(value: &str) -> Self {
        match value {
            "producto_agregado" => Self::ProductAdded,
            "stock_bajo" => Self::LowStock,
            "producto_editado" => Self::ProductEdited,
            "producto_eliminado" => Self::ProductRemoved,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::ProductAdded => "📦",
            Self::LowStock => "⚠️",
            Self::ProductEdited => "✏️",
            Self::ProductRemoved => "🗑️",
            Self::Warning => "⚠️",
            Self::Info => "ℹ️",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: LocalId,
    pub remote_ref: RemoteRef,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Ordering key of the realtime window
    pub date: DateTime<Utc>,
    pub read: bool,
    pub icon: String,
}

/// Fields of a new notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationDraft {
    #[serde(rename = "tipo")]
    pub kind: NotificationKind,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "fecha")]
    pub date: DateTime<Utc>,
    #[serde(rename = "leida")]
    pub read: bool,
    #[serde(rename = "icono")]
    pub icon: String,
}

impl NotificationDraft {
    /// Unread notification stamped now
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            date: Utc::now(),
            read: false,
            icon: kind.icon().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationPatch {
    #[serde(rename = "leida", skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

impl NotificationPatch {
    pub fn mark_read() -> Self {
        Self { read: Some(true) }
    }
}

/// Lenient view of a stored notification; older documents miss some fields.
#[derive(Debug, Deserialize)]
struct StoredNotification {
    #[serde(rename = "tipo", default)]
    kind: Option<String>,
    #[serde(rename = "titulo", default)]
    title: String,
    #[serde(rename = "mensaje", default)]
    message: String,
    #[serde(rename = "fecha", default)]
    date: Option<DateTime<Utc>>,
    #[serde(rename = "leida", default)]
    read: Option<bool>,
    #[serde(rename = "icono", default)]
    icon: Option<String>,
}

impl Entity for Notification {
    type Draft = NotificationDraft;
    type Patch = NotificationPatch;

    const COLLECTION: &'static str = "notificaciones";

    fn local_id(&self) -> LocalId {
        self.id
    }

    fn remote_ref(&self) -> &RemoteRef {
        &self.remote_ref
    }

    fn from_document(local_id: LocalId, document: &Document) -> SyncResult<Self> {
        let stored: StoredNotification = document.decode()?;
        let kind = stored
            .kind
            .as_deref()
            .map(NotificationKind::from_wire)
            .unwrap_or(NotificationKind::Info);
        Ok(Self {
            id: local_id,
            remote_ref: document.remote_ref.clone(),
            kind,
            title: stored.title,
            message: stored.message,
            date: stored.date.unwrap_or(document.created_at),
            read: stored.read.unwrap_or(false),
            icon: stored.icon.unwrap_or_else(|| kind.icon().to_string()),
        })
    }

    fn apply_patch(&mut self, patch: &NotificationPatch) {
        if let Some(read) = patch.read {
            self.read = read;
        }
    }
}
