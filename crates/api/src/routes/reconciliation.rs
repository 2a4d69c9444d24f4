//! Reconciliation queue: side effects that failed and need replaying.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use document_store::DocumentStore;
use fulfillment::{ReconciliationEntry, ReconciliationKind};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::{Auth, ensure_admin};
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReconciliationQuery {
    pub kind: Option<ReconciliationKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResponse {
    pub id: String,
    pub kind: ReconciliationKind,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<u32>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ReconciliationEntry> for ReconciliationResponse {
    fn from(entry: &ReconciliationEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            kind: entry.kind,
            order_id: entry.order_id.map(|id| id.to_string()),
            payment_id: entry.payment_id.map(|id| id.to_string()),
            product_id: entry.product_id.as_ref().map(|id| id.to_string()),
            quantity: entry.quantity,
            reason: entry.reason.clone(),
            created_at: entry.created_at,
        }
    }
}

/// GET /reconciliation (admin)
#[tracing::instrument(skip_all)]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiQuery(query): ApiQuery<ReconciliationQuery>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let entries = state.orders.reconciliation().list(query.kind).await?;
    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "entries": entries.iter().map(ReconciliationResponse::from).collect::<Vec<_>>(),
    })))
}
