use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::OrderItem;
use crate::domain::shipping::Dimensions;
use crate::persistence::StoreError;

// ============================================================================
// Product Catalog Collaborator
// ============================================================================
//
// Supplies per-product shipping defaults for quotes and takes stock out when
// an order's payment is confirmed.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductShippingProfile {
    pub weight_kg: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub price: Option<f64>,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn shipping_profile(&self, product_id: Uuid) -> Result<Option<ProductShippingProfile>, StoreError>;

    /// Remove the ordered quantities from stock
    async fn deduct_stock(&self, items: &[OrderItem]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    profile: ProductShippingProfile,
    stock: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<Uuid, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product_id: Uuid, profile: ProductShippingProfile, stock: i64) {
        self.products
            .write()
            .await
            .insert(product_id, CatalogEntry { profile, stock });
    }

    pub async fn stock(&self, product_id: Uuid) -> Option<i64> {
        self.products.read().await.get(&product_id).map(|e| e.stock)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn shipping_profile(&self, product_id: Uuid) -> Result<Option<ProductShippingProfile>, StoreError> {
        Ok(self
            .products
            .read()
            .await
            .get(&product_id)
            .map(|e| e.profile.clone()))
    }

    async fn deduct_stock(&self, items: &[OrderItem]) -> Result<(), StoreError> {
        let mut products = self.products.write().await;
        for item in items {
            match products.get_mut(&item.product_id) {
                Some(entry) => entry.stock -= i64::from(item.quantity),
                None => {
                    tracing::warn!(product_id = %item.product_id, "Stock deduction for unknown product")
                }
            }
        }
        Ok(())
    }
}
