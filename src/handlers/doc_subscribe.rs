use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{ErrorResponse, StoreEvent};
use crate::store::{DocumentStore, MemoryStore, Subscription};

#[derive(Deserialize)]
pub struct SubscribeQuery {
    format: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FrameFormat {
    Json,
    Cbor,
}

impl FrameFormat {
    fn from_query(format: Option<String>) -> Result<Self, String> {
        match format.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(FrameFormat::Json),
            Some(value) => match value.to_lowercase().as_str() {
                "json" => Ok(FrameFormat::Json),
                "cbor" => Ok(FrameFormat::Cbor),
                other => Err(format!("Invalid frame format '{}'. Use 'json' or 'cbor'.", other)),
            },
        }
    }

    fn encode(self, event: &StoreEvent) -> Result<Message, String> {
        match self {
            FrameFormat::Json => serde_json::to_string(event)
                .map(Message::Text)
                .map_err(|e| e.to_string()),
            FrameFormat::Cbor => serde_cbor::to_vec(event)
                .map(Message::Binary)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Push every write on a document to the connected websocket
pub async fn doc_subscribe(
    State(store): State<Arc<MemoryStore>>,
    Path(doc_id): Path<String>,
    Query(query): Query<SubscribeQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let format = FrameFormat::from_query(query.format)
        .map_err(|message| ErrorResponse::reply(StatusCode::BAD_REQUEST, message))?;

    if store.get(&doc_id).is_none() {
        error!("Subscription requested for unknown document '{}'", doc_id);
        return Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            format!("Document '{}' not found", doc_id),
        ));
    }

    // Subscribe before the upgrade so nothing written after the handshake is missed.
    let events = store.subscribe(&doc_id).await.map_err(|e| {
        error!("Failed to subscribe to document '{}': {}", doc_id, e);
        <(StatusCode, Json<ErrorResponse>)>::from(e)
    })?;

    info!("New subscription attempt for document {}", doc_id);
    Ok(ws
        .on_upgrade(move |socket| forward_events(socket, doc_id, events, format))
        .into_response())
}

async fn forward_events(socket: WebSocket, doc_id: String, mut events: Subscription, format: FrameFormat) {
    let connection_id = Uuid::new_v4();
    info!("Subscription {} established for document {}", connection_id, doc_id);

    let (mut sender, mut receiver) = socket.split();

    let send_doc_id = doc_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let frame = match format.encode(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode event for document {}: {}", send_doc_id, e);
                    continue;
                }
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Subscribers never send anything meaningful; watch for the close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };
    info!("Subscription {} for document {} terminated", connection_id, doc_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_format_from_query() {
        assert_eq!(FrameFormat::from_query(None), Ok(FrameFormat::Json));
        assert_eq!(FrameFormat::from_query(Some(" CBOR ".to_string())), Ok(FrameFormat::Cbor));
        assert!(FrameFormat::from_query(Some("xml".to_string())).is_err());
    }
}
