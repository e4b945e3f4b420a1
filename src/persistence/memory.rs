use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

use super::{CarrierToken, OrderRepository, StoreError, TokenStore};

/// Orders held in process memory; the write lock makes `update_if_status` atomic.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(order.id));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<bool, StoreError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id) {
            Some(stored) if stored.status == expected => {
                *stored = order.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_overdue_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut overdue: Vec<Order> = orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < created_before)
            .cloned()
            .collect();
        overdue.sort_by_key(|o| o.created_at);
        overdue.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(overdue)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    token: RwLock<Option<CarrierToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CarrierToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> Result<Option<CarrierToken>, StoreError> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &CarrierToken) -> Result<(), StoreError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_new_order;
    use crate::domain::order::OpenAs;
    use chrono::Duration;

    #[tokio::test]
    async fn test_conditional_update_only_from_expected_status() {
        let repo = InMemoryOrderRepository::new();
        let order = Order::open(sample_new_order(), OpenAs::Pending, Utc::now()).unwrap();
        repo.insert(&order).await.unwrap();

        let mut confirmed = order.clone();
        confirmed.status = OrderStatus::Confirmed;
        assert!(repo.update_if_status(&confirmed, OrderStatus::Pending).await.unwrap());

        let mut cancelled = order.clone();
        cancelled.status = OrderStatus::Cancelled;
        assert!(!repo.update_if_status(&cancelled, OrderStatus::Pending).await.unwrap());

        let stored = repo.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let repo = InMemoryOrderRepository::new();
        let order = Order::open(sample_new_order(), OpenAs::Pending, Utc::now()).unwrap();
        repo.insert(&order).await.unwrap();
        assert!(matches!(repo.insert(&order).await, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_overdue_pending_query() {
        let repo = InMemoryOrderRepository::new();
        let now = Utc::now();

        let old = Order::open(sample_new_order(), OpenAs::Pending, now - Duration::minutes(30)).unwrap();
        let fresh = Order::open(sample_new_order(), OpenAs::Pending, now).unwrap();
        let old_quote = Order::open(sample_new_order(), OpenAs::Quote, now - Duration::minutes(30)).unwrap();
        for order in [&old, &fresh, &old_quote] {
            repo.insert(order).await.unwrap();
        }

        let overdue = repo
            .find_overdue_pending(now - Duration::minutes(15), 10)
            .await
            .unwrap();

        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, old.id);
    }

    #[tokio::test]
    async fn test_token_store_upserts() {
        let store = InMemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());

        for access in ["first", "second"] {
            store
                .save(&CarrierToken {
                    access_token: access.into(),
                    refresh_token: None,
                    expires_at: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.load().await.unwrap().unwrap().access_token, "second");
    }
}
