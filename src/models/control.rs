use serde::{Deserialize, Serialize};

use super::presence::UserId;

/// Out-of-band signal riding on the document update channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    CollaboratorRemoved {
        #[serde(rename = "removedId")]
        removed_id: UserId,
    },
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    pub fn collaborator_removed(removed_id: impl Into<UserId>) -> Self {
        ControlMessage::CollaboratorRemoved {
            removed_id: removed_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_wire_shape() {
        let json = serde_json::to_value(ControlMessage::collaborator_removed("u7")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "collaborator_removed", "removedId": "u7"}));
    }

    #[test]
    fn unknown_types_parse_to_unknown() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"document_locked","by":"u1"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Unknown);
    }
}
