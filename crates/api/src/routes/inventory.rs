//! Inventory service endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ProductId;
use document_store::DocumentStore;
use domain::{InventoryFilter, InventoryRecord, InventoryStatus, NewInventoryItem, Warehouse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Pagination, page_request};
use crate::auth::{Auth, ensure_admin};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery, money};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 20;

fn warehouse_or_default(warehouse: Option<String>) -> String {
    warehouse
        .filter(|w| !w.trim().is_empty())
        .unwrap_or_else(|| Warehouse::DEFAULT_ID.to_string())
}

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventoryRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    pub reorder_point: Option<u32>,
    pub max_stock: Option<u32>,
    pub warehouse: Option<Warehouse>,
    pub unit_cost: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

/// Body of reserve, release and confirm calls.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    pub product_id: String,
    pub quantity: u32,
    pub warehouse: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeliverRequest {
    pub quantity: u32,
    pub warehouse: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub quantity: u32,
    pub unit_cost: Option<f64>,
    pub warehouse: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WarehouseQuery {
    pub warehouse: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckStockQuery {
    pub quantity: Option<u32>,
    pub warehouse: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInventoryQuery {
    pub status: Option<InventoryStatus>,
    pub warehouse: Option<String>,
    pub low_stock: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub id: String,
    pub inventory_id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub reserved_quantity: u32,
    pub available_quantity: u32,
    pub reorder_point: u32,
    pub max_stock: u32,
    pub warehouse: Warehouse,
    pub cost: CostResponse,
    pub status: InventoryStatus,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
    pub last_movement: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostResponse {
    pub unit_cost: f64,
    pub total_cost: f64,
    pub currency: String,
}

impl From<&InventoryRecord> for InventoryResponse {
    fn from(record: &InventoryRecord) -> Self {
        let cost = record.cost();
        Self {
            id: record.id().to_string(),
            inventory_id: record.inventory_id().to_string(),
            product_id: record.product_id().to_string(),
            sku: record.sku().to_string(),
            name: record.name().to_string(),
            quantity: record.quantity(),
            reserved_quantity: record.reserved_quantity(),
            available_quantity: record.available_quantity(),
            reorder_point: record.reorder_point(),
            max_stock: record.max_stock(),
            warehouse: record.warehouse().clone(),
            cost: CostResponse {
                unit_cost: cost.unit_cost.as_major(),
                total_cost: cost.total_cost.as_major(),
                currency: cost.currency.clone(),
            },
            status: record.status(),
            is_low_stock: record.is_low_stock(),
            is_out_of_stock: record.is_out_of_stock(),
            last_movement: record.last_movement(),
            notes: record.notes().map(String::from),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
        }
    }
}

fn inventory_body(message: &str, record: &InventoryRecord) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "inventory": InventoryResponse::from(record),
    }))
}

// -- Handlers --

/// POST /inventory (admin)
#[tracing::instrument(skip_all)]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiJson(req): ApiJson<CreateInventoryRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    ensure_admin(&requester)?;
    let item = NewInventoryItem {
        product_id: ProductId::new(req.product_id),
        sku: req.sku,
        name: req.name,
        quantity: req.quantity,
        reorder_point: req.reorder_point,
        max_stock: req.max_stock,
        warehouse: req.warehouse,
        unit_cost: req
            .unit_cost
            .map(|cost| money(cost, "unitCost"))
            .transpose()?
            .unwrap_or_default(),
        currency: req.currency,
        notes: req.notes,
    };
    let record = state.inventory.create_item(item).await?;
    Ok((
        StatusCode::CREATED,
        inventory_body("Inventory item created successfully", &record),
    ))
}

/// GET /inventory (admin)
#[tracing::instrument(skip_all)]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiQuery(query): ApiQuery<ListInventoryQuery>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let page = page_request(query.page, query.limit, DEFAULT_LIMIT)?;
    let filter = InventoryFilter {
        status: query.status,
        warehouse_id: query.warehouse,
        low_stock: query.low_stock,
    };
    let records = state.inventory.list(&filter, page).await?;

    Ok(Json(json!({
        "success": true,
        "inventory": records.items.iter().map(InventoryResponse::from).collect::<Vec<_>>(),
        "pagination": Pagination::from(&records),
    })))
}

/// GET /inventory/product/{product_id}
#[tracing::instrument(skip(state, _requester))]
pub async fn get_by_product<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(_requester): Auth,
    Path(product_id): Path<String>,
    ApiQuery(query): ApiQuery<WarehouseQuery>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .inventory
        .get_by_product(
            &ProductId::new(product_id),
            &warehouse_or_default(query.warehouse),
        )
        .await?;
    Ok(Json(json!({ "success": true, "inventory": InventoryResponse::from(&record) })))
}

/// GET /inventory/check/{product_id}
#[tracing::instrument(skip(state, _requester))]
pub async fn check<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(_requester): Auth,
    Path(product_id): Path<String>,
    ApiQuery(query): ApiQuery<CheckStockQuery>,
) -> Result<Json<Value>, ApiError> {
    let check = state
        .inventory
        .check_stock(
            &ProductId::new(product_id),
            query.quantity.unwrap_or(1),
            &warehouse_or_default(query.warehouse),
        )
        .await?;
    Ok(Json(json!({
        "success": true,
        "available": check.available,
        "availableQuantity": check.available_quantity,
        "requestedQuantity": check.requested_quantity,
    })))
}

/// POST /inventory/reserve
#[tracing::instrument(skip_all)]
pub async fn reserve<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(_requester): Auth,
    ApiJson(req): ApiJson<StockMovementRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .inventory
        .reserve_stock(
            &ProductId::new(req.product_id),
            req.quantity,
            &warehouse_or_default(req.warehouse),
        )
        .await?;
    Ok(inventory_body("Stock reserved successfully", &record))
}

/// POST /inventory/release
#[tracing::instrument(skip_all)]
pub async fn release<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(_requester): Auth,
    ApiJson(req): ApiJson<StockMovementRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .inventory
        .release_reserved_stock(
            &ProductId::new(req.product_id),
            req.quantity,
            &warehouse_or_default(req.warehouse),
        )
        .await?;
    Ok(inventory_body("Reserved stock released successfully", &record))
}

/// POST /inventory/confirm
#[tracing::instrument(skip_all)]
pub async fn confirm<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(_requester): Auth,
    ApiJson(req): ApiJson<StockMovementRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .inventory
        .confirm_movement(
            &ProductId::new(req.product_id),
            req.quantity,
            &warehouse_or_default(req.warehouse),
        )
        .await?;
    Ok(inventory_body("Stock movement confirmed", &record))
}

/// PUT /inventory/product/{product_id}/deliver
///
/// Trusted internal endpoint, no bearer token.
#[tracing::instrument(skip(state, req))]
pub async fn deliver<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    ApiJson(req): ApiJson<DeliverRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .inventory
        .deliver(
            &ProductId::new(product_id),
            req.quantity,
            &warehouse_or_default(req.warehouse),
        )
        .await?;
    Ok(inventory_body("Inventory updated for delivery", &record))
}

/// PUT /inventory/product/{product_id}/add-stock (admin)
#[tracing::instrument(skip(state, requester, req))]
pub async fn add_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    Path(product_id): Path<String>,
    ApiJson(req): ApiJson<AddStockRequest>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let record = state
        .inventory
        .add_stock(
            &ProductId::new(product_id),
            req.quantity,
            req.unit_cost
                .map(|cost| money(cost, "unitCost"))
                .transpose()?,
            &warehouse_or_default(req.warehouse),
        )
        .await?;
    Ok(inventory_body("Stock added successfully", &record))
}

/// GET /inventory/low-stock (admin)
#[tracing::instrument(skip_all)]
pub async fn low_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiQuery(query): ApiQuery<WarehouseQuery>,
) -> Result<Json<Value>, ApiError> {
    ensure_admin(&requester)?;
    let records = state
        .inventory
        .low_stock_items(query.warehouse.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": records.len(),
        "items": records.iter().map(InventoryResponse::from).collect::<Vec<_>>(),
    })))
}
