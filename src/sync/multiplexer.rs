//! Splits inbound store events into content, presence and control updates.

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{ControlMessage, DocumentPatch, PresenceTable, StoreEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    ContentUpdate(String),
    PresenceUpdate(PresenceTable),
    ControlSignal(ControlMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// The local user lost access; the session cannot continue.
    ForceReload,
    Drop,
}

/// A payload carrying a control envelope yields only the control signal,
/// so the document body and presence table are never touched by it.
pub fn classify(event: StoreEvent) -> Vec<UpdateEvent> {
    let payload = event.payload;
    if let Some(envelope) = payload.message {
        return vec![UpdateEvent::ControlSignal(parse_envelope(envelope))];
    }

    let mut updates = vec![UpdateEvent::ContentUpdate(payload.content)];
    if let Some(table) = payload.presence {
        updates.push(UpdateEvent::PresenceUpdate(table));
    }
    updates
}

fn parse_envelope(envelope: Value) -> ControlMessage {
    match serde_json::from_value::<ControlMessage>(envelope) {
        Ok(message) => message,
        Err(e) => {
            warn!("Unreadable control envelope: {}", e);
            ControlMessage::Unknown
        }
    }
}

pub fn route(message: &ControlMessage, local_user: &str) -> ControlAction {
    match message {
        ControlMessage::CollaboratorRemoved { removed_id } if removed_id == local_user => ControlAction::ForceReload,
        ControlMessage::CollaboratorRemoved { removed_id } => {
            debug!("Collaborator {} removed", removed_id);
            ControlAction::Drop
        }
        ControlMessage::Unknown => ControlAction::Drop,
    }
}

/// Patch that carries only the control envelope, leaving content untouched.
pub fn control_patch(message: &ControlMessage) -> Result<DocumentPatch, serde_json::Error> {
    Ok(DocumentPatch::message(serde_json::to_value(message)?))
}
