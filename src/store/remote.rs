use futures_util::future::{self, BoxFuture};
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::{DocumentStore, StoreError, Subscription};
use crate::models::{CreateDocumentRequest, Document, DocumentPatch, StoreEvent};

/// Frame encoding requested for the push subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Cbor,
}

impl WireFormat {
    pub fn as_query(self) -> &'static str {
        match self {
            WireFormat::Json => "json",
            WireFormat::Cbor => "cbor",
        }
    }
}

/// Client for the reference store server.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
    format: WireFormat,
}

impl RemoteStore {
    /// `base_url` points at the server's API root, e.g. `http://127.0.0.1:3000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            format: WireFormat::default(),
        })
    }

    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub async fn create(&self, request: &CreateDocumentRequest) -> Result<Document, StoreError> {
        let url = format!("{}/v1/documents", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        read_document(response, request.id.as_deref().unwrap_or("<new>")).await
    }

    fn document_url(&self, document_id: &str) -> String {
        format!("{}/v1/documents/{}", self.base_url, document_id)
    }

    fn subscribe_url(&self, document_id: &str) -> String {
        let http = format!("{}/subscribe?format={}", self.document_url(document_id), self.format.as_query());
        if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            http
        }
    }
}

async fn read_document(response: Response, document_id: &str) -> Result<Document, StoreError> {
    match response.status() {
        status if status.is_success() => Ok(response.json::<Document>().await?),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(document_id.to_string())),
        StatusCode::CONFLICT => Err(StoreError::AlreadyExists(document_id.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized(document_id.to_string())),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::UnknownAttribute(body))
        }
        status => Err(StoreError::Transport(format!("unexpected status {} for document '{}'", status, document_id))),
    }
}

fn decode_frame(message: Message) -> Option<StoreEvent> {
    match message {
        Message::Text(text) => match serde_json::from_str::<StoreEvent>(text.as_str()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Dropping malformed JSON frame: {}", e);
                None
            }
        },
        Message::Binary(bin) => match serde_cbor::from_slice::<StoreEvent>(&bin) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Dropping malformed CBOR frame: {}", e);
                None
            }
        },
        _ => None,
    }
}

impl DocumentStore for RemoteStore {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Document, StoreError>> {
        Box::pin(async move {
            let response = self.client.get(self.document_url(document_id)).send().await?;
            read_document(response, document_id).await
        })
    }

    fn update<'a>(&'a self, document_id: &'a str, patch: DocumentPatch) -> BoxFuture<'a, Result<Document, StoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .patch(self.document_url(document_id))
                .json(&patch)
                .send()
                .await?;
            read_document(response, document_id).await
        })
    }

    fn subscribe<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Subscription, StoreError>> {
        Box::pin(async move {
            let url = self.subscribe_url(document_id);
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await.map_err(|e| {
                error!("Failed to open subscription for {}: {}", document_id, e);
                StoreError::from(e)
            })?;
            info!("Subscribed to document {} via {}", document_id, url);

            let doc_id = document_id.to_string();
            let events = ws_stream
                .take_while(move |frame| {
                    if let Err(e) = frame {
                        debug!("Subscription for {} closed: {}", doc_id, e);
                    }
                    future::ready(frame.is_ok())
                })
                .filter_map(|frame| future::ready(frame.ok().and_then(decode_frame)));
            Ok(events.boxed())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_url_switches_scheme() {
        let store = RemoteStore::new("http://localhost:3000/api/").unwrap();
        assert_eq!(
            store.subscribe_url("d1"),
            "ws://localhost:3000/api/v1/documents/d1/subscribe?format=json"
        );
        let store = RemoteStore::new("https://example.org/api").unwrap().with_format(WireFormat::Cbor);
        assert_eq!(
            store.subscribe_url("d1"),
            "wss://example.org/api/v1/documents/d1/subscribe?format=cbor"
        );
    }

    #[test]
    fn frames_decode_from_json_and_cbor() {
        let event = StoreEvent::update(Document::new("d1", "hello"));
        let text = serde_json::to_string(&event).unwrap();
        assert_eq!(decode_frame(Message::text(text)), Some(event.clone()));

        let bin = serde_cbor::to_vec(&event).unwrap();
        assert_eq!(decode_frame(Message::binary(bin)), Some(event));

        assert_eq!(decode_frame(Message::text("not json")), None);
    }
}
