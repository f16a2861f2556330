//! Product catalog, order commands, the fulfillment saga trigger and order
//! read models.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::{CommandResult, Money, Order, OrderLine, OrderStatus, ShippingAddress};
use event_store::{EventStore, SnapshotStore};
use projections::{OrderSummary, SalesStatistics};
use saga::{InventoryService, Product, SagaLog};
use serde::{Deserialize, Serialize};

use super::id_or_generate;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub order_id: Option<String>,
    pub customer_id: String,
    pub lines: Vec<LineRequest>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
}

#[derive(Deserialize)]
pub struct ShipRequest {
    pub tracking_number: String,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub item_count: u64,
    pub version: i64,
}

impl From<&CommandResult<Order>> for OrderResponse {
    fn from(result: &CommandResult<Order>) -> Self {
        let order = result.state();
        Self {
            order_id: result.root.id().to_string(),
            customer_id: order.customer_id().to_string(),
            status: order.status(),
            total_amount: order.total_amount(),
            item_count: order.item_count(),
            version: result.version().as_i64(),
        }
    }
}

// -- Handlers --

/// POST /products
pub async fn add_product<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(product): Json<Product>,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    if product.product_id.trim().is_empty() {
        return Err(ApiError::BadRequest("product_id must not be blank".into()));
    }
    if !product.unit_price.is_positive() {
        return Err(ApiError::BadRequest("unit_price must be positive".into()));
    }

    state.inventory.add_product(product.clone()).await;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id}
pub async fn product<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    state
        .inventory
        .product(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))
}

/// POST /orders
///
/// Lines name catalog products; name, category and price come from the
/// catalog.
pub async fn place<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let order_id = id_or_generate(req.order_id)?;

    let mut lines = Vec::with_capacity(req.lines.len());
    for line in req.lines {
        let product = state
            .inventory
            .product(&line.product_id)
            .await
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown product: {}", line.product_id)))?;
        lines.push(OrderLine::new(
            product.product_id,
            product.name,
            product.category,
            line.quantity,
            product.unit_price,
        ));
    }

    let result = state
        .orders
        .place(order_id, &req.customer_id, lines, req.shipping_address)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&result))))
}

/// GET /orders/{id}
pub async fn get<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderSummary>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    state
        .order_dashboard
        .get(&AggregateId::new(&id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}

/// POST /orders/{id}/fulfill
///
/// Runs the fulfillment saga. A compensated saga is still a 200: the outcome
/// is in the returned log.
pub async fn fulfill<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaLog>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let log = state.fulfillments.fulfill(&AggregateId::new(id)).await?;
    Ok(Json(log))
}

/// POST /orders/{id}/ship
pub async fn ship<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ShipRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let result = state
        .orders
        .ship(&AggregateId::new(id), &req.tracking_number)
        .await?;
    Ok(Json(OrderResponse::from(&result)))
}

/// POST /orders/{id}/cancel
///
/// Returns any stock the order still holds.
pub async fn cancel<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let order_id = AggregateId::new(id);
    let result = state.orders.cancel(&order_id, &req.reason).await?;
    state.inventory.release(&order_id).await?;
    Ok(Json(OrderResponse::from(&result)))
}

/// GET /sales/statistics/{category}
pub async fn statistics<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(category): Path<String>,
) -> Result<Json<SalesStatistics>, ApiError>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    state
        .sales_statistics
        .get(&category)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No orders in category {category}")))
}
