//! Inventory service trait and in-memory product catalog.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Money, OrderLine};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};

/// A catalog entry with its available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub stock: u32,
}

/// Trait for inventory management operations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn product(&self, product_id: &str) -> Option<Product>;

    /// Takes the stock for every line of an order, or none of it.
    /// Reserving an order twice is a no-op.
    async fn reserve(&self, order_id: &AggregateId, lines: &[OrderLine]) -> Result<()>;

    /// Returns an order's reserved stock. Unknown orders are ignored.
    async fn release(&self, order_id: &AggregateId) -> Result<()>;
}

/// Units requested per product, summing repeated lines.
pub(crate) fn requested_units(lines: &[OrderLine]) -> BTreeMap<&str, u32> {
    let mut requested: BTreeMap<&str, u32> = BTreeMap::new();
    for line in lines {
        let units = requested.entry(line.product_id.as_str()).or_default();
        *units = units.saturating_add(line.quantity);
    }
    requested
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<String, Product>,
    reservations: HashMap<AggregateId, Vec<(String, u32)>>,
    fail_on_reserve: bool,
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product, replacing any entry with the same id.
    pub async fn add_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.product_id.clone(), product);
    }

    pub async fn stock(&self, product_id: &str) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// All products, sorted by id.
    pub async fn products(&self) -> Vec<Product> {
        let mut all: Vec<Product> = self.state.read().await.products.values().cloned().collect();
        all.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        all
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    /// Makes every following reserve call fail.
    pub async fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().await.fail_on_reserve = fail;
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn product(&self, product_id: &str) -> Option<Product> {
        self.state.read().await.products.get(product_id).cloned()
    }

    async fn reserve(&self, order_id: &AggregateId, lines: &[OrderLine]) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_reserve {
            return Err(SagaError::Inventory("Inventory unavailable".to_string()));
        }
        if state.reservations.contains_key(order_id) {
            return Ok(());
        }

        let requested = requested_units(lines);
        for (product_id, units) in &requested {
            let product = state
                .products
                .get(*product_id)
                .ok_or_else(|| SagaError::Inventory(format!("Product not found: {product_id}")))?;
            if product.stock < *units {
                return Err(SagaError::Inventory(format!(
                    "Insufficient stock for product: {product_id} (available: {}, requested: {units})",
                    product.stock
                )));
            }
        }

        let mut taken = Vec::with_capacity(requested.len());
        for (product_id, units) in requested {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock -= units;
                taken.push((product_id.to_string(), units));
            }
        }
        state.reservations.insert(order_id.clone(), taken);
        Ok(())
    }

    async fn release(&self, order_id: &AggregateId) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(taken) = state.reservations.remove(order_id) else {
            return Ok(());
        };
        for (product_id, units) in taken {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = product.stock.saturating_add(units);
            }
        }
        Ok(())
    }
}
