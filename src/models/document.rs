use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::presence::PresenceTable;

pub type DocumentId = String;

/// Event name attached to every write, independent of the document id.
pub const UPDATE_EVENT: &str = "documents.*.update";
pub const CREATE_EVENT: &str = "documents.*.create";

/// A shared text document as held by the store.
///
/// `presence` is `None` for documents whose schema predates presence
/// tracking. `message` only ever appears on the payload of the event that
/// carried it; the store never persists it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceTable>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_message", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub message: Option<Value>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            presence: Some(PresenceTable::default()),
            updated_at: Utc::now(),
            message: None,
        }
    }

    /// A document created before the presence field existed.
    pub fn without_presence(id: impl Into<DocumentId>, content: impl Into<String>) -> Self {
        Self {
            presence: None,
            ..Self::new(id, content)
        }
    }

    pub fn supports_presence(&self) -> bool {
        self.presence.is_some()
    }
}

/// Partial update; absent fields are left untouched by the store.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceTable>,
    #[serde(rename = "_message", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub message: Option<Value>,
}

impl DocumentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn presence(table: PresenceTable) -> Self {
        Self {
            presence: Some(table),
            ..Default::default()
        }
    }

    pub fn message(message: Value) -> Self {
        Self {
            message: Some(message),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.presence.is_none() && self.message.is_none()
    }
}

/// Push notification emitted by the store after every write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct StoreEvent {
    pub events: Vec<String>,
    pub payload: Document,
}

impl StoreEvent {
    pub fn update(payload: Document) -> Self {
        Self {
            events: vec![format!("documents.{}.update", payload.id), UPDATE_EVENT.to_string()],
            payload,
        }
    }

    pub fn create(payload: Document) -> Self {
        Self {
            events: vec![format!("documents.{}.create", payload.id), CREATE_EVENT.to_string()],
            payload,
        }
    }

    pub fn is_update(&self) -> bool {
        self.events.iter().any(|e| e == UPDATE_EVENT)
    }
}

/// Request body for creating a document
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_presence")]
    pub presence: bool,
}

fn default_presence() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_uses_underscore_wire_name() {
        let patch = DocumentPatch::message(serde_json::json!({"type": "collaborator_removed", "removedId": "u2"}));
        let json = serde_json::to_value(&patch).unwrap();
        assert!(json.get("_message").is_some());
        assert!(json.get("content").is_none());
    }

    #[test]
    fn older_documents_deserialize_without_presence() {
        let doc: Document = serde_json::from_str(
            r#"{"id":"d1","content":"hi","updatedAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(!doc.supports_presence());
        assert!(doc.message.is_none());
    }

    #[test]
    fn update_events_carry_wildcard_name() {
        let event = StoreEvent::update(Document::new("d1", "x"));
        assert!(event.is_update());
        assert_eq!(event.events[0], "documents.d1.update");
        assert!(!StoreEvent::create(Document::new("d1", "x")).is_update());
    }
}
