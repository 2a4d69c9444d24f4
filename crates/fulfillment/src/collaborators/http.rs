//! HTTP collaborators speaking the services' JSON envelopes.

use async_trait::async_trait;
use common::{Money, ProductId, RecordId, Requester, UserId};
use domain::{OrderStatus, PaymentStatus};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{InventoryGateway, OrderGateway, OrderSummary, ProductCatalog, ProductSnapshot};
use crate::error::{FulfillmentError, Result};

const PRODUCT: &str = "product";
const ORDER: &str = "order";
const INVENTORY: &str = "inventory";

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct ProductEnvelope {
    product: ProductBody,
}

#[derive(Deserialize)]
struct ProductBody {
    name: String,
    price: f64,
    #[serde(default)]
    stock: u32,
}

#[derive(Deserialize)]
struct OrderEnvelope {
    order: OrderBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    id: RecordId,
    user_id: UserId,
    final_amount: f64,
    status: OrderStatus,
    payment_status: PaymentStatus,
}

fn base(url: impl Into<String>) -> String {
    url.into().trim_end_matches('/').to_string()
}

async fn send(service: &'static str, request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| FulfillmentError::upstream(service, e))
}

async fn rejected(service: &'static str, response: Response) -> FulfillmentError {
    let status = response.status().as_u16();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    FulfillmentError::Rejected {
        service,
        status,
        message,
    }
}

async fn expect_success(service: &'static str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(rejected(service, response).await)
    }
}

/// Product service client.
#[derive(Clone)]
pub struct HttpProductCatalog {
    client: Client,
    base_url: String,
}

impl HttpProductCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<ProductSnapshot> {
        let url = format!("{}/products/{}", self.base_url, id);
        let response = send(PRODUCT, self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FulfillmentError::ProductNotFound(id.clone()));
        }

        let envelope: ProductEnvelope = expect_success(PRODUCT, response)
            .await?
            .json()
            .await
            .map_err(|e| FulfillmentError::upstream(PRODUCT, e))?;
        Ok(ProductSnapshot {
            id: id.clone(),
            name: envelope.product.name,
            price: Money::try_from_major(envelope.product.price)
                .ok_or_else(|| FulfillmentError::upstream(PRODUCT, "product price out of range"))?,
            stock: envelope.product.stock,
        })
    }

    async fn set_system_stock(&self, id: &ProductId, stock: u32) -> Result<()> {
        let url = format!("{}/products/{}/system-stock", self.base_url, id);
        let response = send(PRODUCT, self.client.put(url).json(&json!({ "stock": stock }))).await?;
        expect_success(PRODUCT, response).await?;
        Ok(())
    }
}

/// Order service client.
#[derive(Clone)]
pub struct HttpOrderGateway {
    client: Client,
    base_url: String,
}

impl HttpOrderGateway {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    /// Fetches the order with the caller's own token, so the order service
    /// applies its ownership rules.
    async fn fetch_order(&self, id: RecordId, requester: &Requester) -> Result<OrderSummary> {
        let url = format!("{}/orders/{}", self.base_url, id);
        let mut request = self.client.get(url);
        if let Some(token) = &requester.token {
            request = request.bearer_auth(token);
        }

        let response = send(ORDER, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(FulfillmentError::OrderNotFound(id)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FulfillmentError::Forbidden(
                    "Not authorized to access this order".to_string(),
                ));
            }
            _ => {}
        }

        let envelope: OrderEnvelope = expect_success(ORDER, response)
            .await?
            .json()
            .await
            .map_err(|e| FulfillmentError::upstream(ORDER, e))?;
        let order = envelope.order;
        Ok(OrderSummary {
            id: order.id,
            user_id: order.user_id,
            final_amount: Money::try_from_major(order.final_amount)
                .ok_or_else(|| FulfillmentError::upstream(ORDER, "order amount out of range"))?,
            status: order.status,
            payment_status: order.payment_status,
        })
    }

    async fn system_update_status(
        &self,
        id: RecordId,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<()> {
        let url = format!("{}/orders/{}/system-status", self.base_url, id);
        let mut body = json!({ "status": status });
        if let Some(payment_status) = payment_status {
            body["paymentStatus"] = json!(payment_status);
        }

        let response = send(ORDER, self.client.put(url).json(&body)).await?;
        expect_success(ORDER, response).await?;
        Ok(())
    }
}

/// Inventory service client.
#[derive(Clone)]
pub struct HttpInventoryGateway {
    client: Client,
    base_url: String,
}

impl HttpInventoryGateway {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base(base_url),
        }
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    async fn deliver(
        &self,
        product_id: &ProductId,
        quantity: u32,
        warehouse_id: &str,
    ) -> Result<()> {
        let url = format!("{}/inventory/product/{}/deliver", self.base_url, product_id);
        let body = json!({ "quantity": quantity, "warehouse": warehouse_id });
        let response = send(INVENTORY, self.client.put(url).json(&body)).await?;
        expect_success(INVENTORY, response).await?;
        Ok(())
    }
}
