//! Payment service endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{RecordId, UserId};
use document_store::DocumentStore;
use domain::{
    Currency, GatewayRefs, NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentState,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Pagination, page_request};
use crate::auth::{Auth, ensure_admin};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery, money, optional_json, record_id};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 10;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: RecordId,
    pub amount: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub gateway_intent_id: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub amount: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideStatusRequest {
    pub status: PaymentState,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<PaymentState>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub payment_id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: Currency,
    pub status: PaymentState,
    pub payment_method: PaymentMethod,
    pub gateway_intent_id: Option<String>,
    pub transaction_id: Option<String>,
    pub refund_id: Option<String>,
    pub refund_amount: f64,
    pub refund_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub settle_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id().to_string(),
            payment_id: payment.payment_id().to_string(),
            order_id: payment.order_id().to_string(),
            user_id: payment.user_id().to_string(),
            amount: payment.amount().as_major(),
            currency: payment.currency(),
            status: payment.status(),
            payment_method: payment.method(),
            gateway_intent_id: payment.gateway_intent_id().map(String::from),
            transaction_id: payment.transaction_id().map(String::from),
            refund_id: payment.refund_id().map(String::from),
            refund_amount: payment.refund_amount().as_major(),
            refund_reason: payment.refund_reason().map(String::from),
            failure_reason: payment.failure_reason().map(String::from),
            settle_at: payment.settle_at(),
            completed_at: payment.completed_at(),
            metadata: payment.metadata().clone(),
            created_at: payment.created_at(),
            updated_at: payment.updated_at(),
        }
    }
}

fn payment_body(message: &str, payment: &Payment) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "payment": PaymentResponse::from(payment),
    }))
}

// -- Handlers --

/// POST /payments
#[tracing::instrument(skip_all)]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let new = NewPayment {
        order_id: req.order_id,
        amount: money(req.amount, "amount")?,
        currency: req.currency,
        method: req.payment_method,
        metadata: req.metadata,
    };
    let payment = state.payments.create_payment(&requester, new).await?;
    Ok((
        StatusCode::CREATED,
        payment_body("Payment created successfully", &payment),
    ))
}

/// GET /payments (admin)
#[tracing::instrument(skip_all)]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiQuery(query): ApiQuery<ListPaymentsQuery>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let page = page_request(query.page, query.limit, DEFAULT_LIMIT)?;
    let filter = PaymentFilter {
        status: query.status,
    };
    let payments = state.payments.payments().list(&filter, page).await?;

    Ok(Json(json!({
        "success": true,
        "payments": payments.items.iter().map(PaymentResponse::from).collect::<Vec<_>>(),
        "pagination": Pagination::from(&payments),
    })))
}

/// GET /payments/{id}
#[tracing::instrument(skip(state, requester))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let payment = state
        .payments
        .payments()
        .get_for(record_id(&id)?, &requester)
        .await?;
    Ok(Json(json!({ "success": true, "payment": PaymentResponse::from(&payment) })))
}

/// GET /payments/user/{user_id}
#[tracing::instrument(skip(state, requester))]
pub async fn list_for_user<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user_id = UserId::parse(&user_id)
        .map_err(|_| ApiError::Validation(format!("Invalid user ID format: {user_id}")))?;
    let payments = state
        .payments
        .payments()
        .list_for_user(user_id, &requester)
        .await?;

    Ok(Json(json!({
        "success": true,
        "payments": payments.iter().map(PaymentResponse::from).collect::<Vec<_>>(),
    })))
}

/// POST /payments/{id}/process (admin)
///
/// Responds once the payment is `processing`; settlement happens later.
#[tracing::instrument(skip(state, requester, body))]
pub async fn process<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let req: ProcessPaymentRequest = optional_json(&body)?;
    let refs = GatewayRefs {
        gateway_intent_id: req.gateway_intent_id,
        transaction_id: req.transaction_id,
    };
    let payment = state.payments.process_payment(record_id(&id)?, refs).await?;
    Ok(payment_body("Payment processing started", &payment))
}

/// POST /payments/{id}/refund (admin)
#[tracing::instrument(skip(state, requester, req))]
pub async fn refund<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RefundRequest>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let payment = state
        .payments
        .refund(record_id(&id)?, money(req.amount, "amount")?, req.reason)
        .await?;
    Ok(payment_body("Refund processed successfully", &payment))
}

/// PUT /payments/{id}/status (admin)
#[tracing::instrument(skip(state, requester, req))]
pub async fn override_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<OverrideStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let payment = state
        .payments
        .override_status(record_id(&id)?, req.status, req.failure_reason)
        .await?;
    Ok(payment_body("Payment status updated", &payment))
}
