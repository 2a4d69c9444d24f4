//! Order service endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ProductId;
use document_store::DocumentStore;
use domain::{
    Order, OrderFilter, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
    StatusUpdate,
};
use fulfillment::{DeliverySyncReport, PlaceOrder, RequestedItem};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Pagination, page_request};
use crate::auth::Auth;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery, optional_json, record_id};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 10;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: AddressRequest,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusRequest {
    pub status: OrderStatus,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub user_email: String,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: f64,
    pub shipping_cost: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: AddressResponse,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub product_price: f64,
    pub quantity: u32,
    pub subtotal: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySyncResponse {
    pub items: usize,
    pub inventory_failures: usize,
    pub product_failures: usize,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            product_price: item.product_price.as_major(),
            quantity: item.quantity,
            subtotal: item.subtotal.as_major(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let address = order.shipping_address();
        Self {
            id: order.id().to_string(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id().to_string(),
            user_email: order.user_email().to_string(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            total_amount: order.total_amount().as_major(),
            shipping_cost: order.shipping_cost().as_major(),
            discount_amount: order.discount_amount().as_major(),
            final_amount: order.final_amount().as_major(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_method: order.payment_method(),
            shipping_address: AddressResponse {
                street: address.street.clone(),
                city: address.city.clone(),
                postal_code: address.postal_code.clone(),
                country: address.country.clone(),
            },
            notes: order.notes().map(String::from),
            tracking_number: order.tracking_number().map(String::from),
            estimated_delivery: order.estimated_delivery(),
            delivered_at: order.delivered_at(),
            cancelled_at: order.cancelled_at(),
            cancel_reason: order.cancel_reason().map(String::from),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

impl From<&DeliverySyncReport> for DeliverySyncResponse {
    fn from(report: &DeliverySyncReport) -> Self {
        Self {
            items: report.items,
            inventory_failures: report.inventory_failures,
            product_failures: report.product_failures,
        }
    }
}

// -- Handlers --

/// POST /orders
#[tracing::instrument(skip_all)]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = PlaceOrder {
        items: req
            .items
            .into_iter()
            .map(|line| RequestedItem {
                product_id: ProductId::new(line.product_id),
                quantity: line.quantity,
            })
            .collect(),
        shipping_address: ShippingAddress::new(
            req.shipping_address.street,
            req.shipping_address.city,
            req.shipping_address.postal_code,
            req.shipping_address.country,
        ),
        payment_method: req.payment_method,
        notes: req.notes,
    };

    let order = state.orders.place_order(&requester, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order created successfully",
            "order": OrderResponse::from(&order),
        })),
    ))
}

/// GET /orders
#[tracing::instrument(skip_all)]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiQuery(query): ApiQuery<ListOrdersQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = page_request(query.page, query.limit, DEFAULT_LIMIT)?;
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
    };
    let orders = state.orders.orders().list_for(&requester, &filter, page).await?;

    Ok(Json(json!({
        "success": true,
        "orders": orders.items.iter().map(OrderResponse::from).collect::<Vec<_>>(),
        "pagination": Pagination::from(&orders),
    })))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, requester))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let order = state
        .orders
        .orders()
        .get_for(record_id(&id)?, &requester)
        .await?;
    Ok(Json(json!({ "success": true, "order": OrderResponse::from(&order) })))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, requester, req))]
pub async fn update_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let update = StatusUpdate {
        status: req.status,
        tracking_number: req.tracking_number,
        estimated_delivery: req.estimated_delivery,
        cancel_reason: req.cancel_reason,
    };
    let outcome = state
        .orders
        .update_status(record_id(&id)?, &requester, update)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order status updated successfully",
        "order": OrderResponse::from(outcome.order()),
        "deliverySync": outcome.delivery.as_ref().map(DeliverySyncResponse::from),
    })))
}

/// PUT /orders/{id}/system-status
///
/// Trusted internal endpoint, no bearer token.
#[tracing::instrument(skip(state, req))]
pub async fn system_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SystemStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .orders
        .system_update_status(record_id(&id)?, req.status, req.payment_status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order status updated successfully",
        "order": OrderResponse::from(outcome.order()),
        "deliverySync": outcome.delivery.as_ref().map(DeliverySyncResponse::from),
    })))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state, requester, body))]
pub async fn cancel<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: CancelRequest = optional_json(&body)?;
    let order = state
        .orders
        .orders()
        .cancel(record_id(&id)?, &requester, req.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order cancelled successfully",
        "order": OrderResponse::from(&order),
    })))
}
