//! Product service stub: lookups and the denormalized stock counter.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ProductId;
use document_store::DocumentStore;
use fulfillment::{FulfillmentError, NewProduct, Product};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::{Auth, ensure_admin};
use crate::error::ApiError;
use crate::extract::{ApiJson, money};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct SystemStockRequest {
    pub stock: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            price: product.price.as_major(),
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// POST /products (admin)
#[tracing::instrument(skip_all)]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(requester): Auth,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    ensure_admin(&requester)?;
    let product = state
        .products
        .create(NewProduct {
            name: req.name,
            description: req.description,
            category: req.category,
            price: money(req.price, "price")?,
            stock: req.stock,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product created successfully",
            "product": ProductResponse::from(&product),
        })),
    ))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let product = state
        .products
        .find(&ProductId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(json!({ "success": true, "product": ProductResponse::from(&product) })))
}

/// PUT /products/{id}/system-stock
///
/// Trusted internal endpoint, no bearer token. Sets the stock unconditionally.
#[tracing::instrument(skip(state, req))]
pub async fn system_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SystemStockRequest>,
) -> Result<Json<Value>, ApiError> {
    let product = state
        .products
        .set_stock(&ProductId::new(id), req.stock)
        .await
        .map_err(|e| match e {
            FulfillmentError::ProductNotFound(_) => {
                ApiError::NotFound("Product not found".to_string())
            }
            other => other.into(),
        })?;
    Ok(Json(json!({
        "success": true,
        "message": "Stock updated",
        "product": ProductResponse::from(&product),
    })))
}
