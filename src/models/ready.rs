use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Readiness report with a snapshot of what the store holds
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ReadyResponse {
    pub status: String,
    pub documents: usize,
    /// Open push subscriptions across all documents
    pub subscribers: usize,
}
