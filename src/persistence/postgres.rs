use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use crate::catalog::{ProductCatalog, ProductShippingProfile};
use crate::domain::order::{CancellationReason, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
use crate::domain::shipping::Dimensions;

use super::{CarrierToken, OrderRepository, StoreError, TokenStore};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Tables:
// - orders          one row per order; items and address as JSONB
// - carrier_tokens  at most one row, id = 1
// - products        shipping profile and stock per product
//
// ============================================================================

const CARRIER_TOKEN_ROW: i16 = 1;

const ORDER_COLUMNS: &str = "id, order_number, status, customer_id, items, subtotal_cents, shipping_cents, \
     discount_cents, total_cents, payment_method, shipping_address, tracking_code, tracking_url, \
     cancellation, created_at, updated_at, paid_at, shipped_at, delivered_at, cancelled_at";

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        order_number TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        customer_id UUID,
        items JSONB NOT NULL,
        subtotal_cents BIGINT NOT NULL,
        shipping_cents BIGINT NOT NULL,
        discount_cents BIGINT NOT NULL,
        total_cents BIGINT NOT NULL,
        payment_method TEXT,
        shipping_address JSONB NOT NULL,
        tracking_code TEXT,
        tracking_url TEXT,
        cancellation JSONB,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        paid_at TIMESTAMPTZ,
        shipped_at TIMESTAMPTZ,
        delivered_at TIMESTAMPTZ,
        cancelled_at TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS idx_orders_pending_created_at
        ON orders (created_at) WHERE status = 'PENDING'",
    "CREATE TABLE IF NOT EXISTS carrier_tokens (
        id SMALLINT PRIMARY KEY,
        access_token TEXT NOT NULL,
        refresh_token TEXT,
        expires_at TIMESTAMPTZ,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        price_cents BIGINT NOT NULL,
        weight_kg DOUBLE PRECISION,
        height_cm DOUBLE PRECISION,
        width_cm DOUBLE PRECISION,
        length_cm DOUBLE PRECISION,
        stock BIGINT NOT NULL DEFAULT 0
    )",
];

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if missing.
    pub async fn init(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Order, token and product tables initialized (PostgreSQL)");
        Ok(())
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let Json(items): Json<Vec<OrderItem>> = row.try_get("items")?;
    let Json(shipping_address): Json<ShippingAddress> = row.try_get("shipping_address")?;
    let cancellation: Option<Json<CancellationReason>> = row.try_get("cancellation")?;
    let payment_method: Option<String> = row.try_get("payment_method")?;

    Ok(Order {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        status,
        customer_id: row.try_get("customer_id")?,
        items,
        subtotal_cents: row.try_get("subtotal_cents")?,
        shipping_cents: row.try_get("shipping_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        total_cents: row.try_get("total_cents")?,
        payment_method: payment_method.map(PaymentMethod),
        shipping_address,
        tracking_code: row.try_get("tracking_code")?,
        tracking_url: row.try_get("tracking_url")?,
        cancellation: cancellation.map(|Json(reason)| reason),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        paid_at: row.try_get("paid_at")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO orders ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
            ORDER_COLUMNS
        );

        let result = sqlx::query(&sql)
            .bind(order.id)
            .bind(&order.order_number)
            .bind(order.status.as_str())
            .bind(order.customer_id)
            .bind(Json(&order.items))
            .bind(order.subtotal_cents)
            .bind(order.shipping_cents)
            .bind(order.discount_cents)
            .bind(order.total_cents)
            .bind(order.payment_method.as_ref().map(|m| m.as_str().to_string()))
            .bind(Json(&order.shipping_address))
            .bind(&order.tracking_code)
            .bind(&order.tracking_url)
            .bind(order.cancellation.as_ref().map(Json))
            .bind(order.created_at)
            .bind(order.updated_at)
            .bind(order.paid_at)
            .bind(order.shipped_at)
            .bind(order.delivered_at)
            .bind(order.cancelled_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Duplicate(order.id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET
                status = $1,
                payment_method = $2,
                tracking_code = $3,
                tracking_url = $4,
                cancellation = $5,
                updated_at = $6,
                paid_at = $7,
                shipped_at = $8,
                delivered_at = $9,
                cancelled_at = $10
             WHERE id = $11 AND status = $12",
        )
        .bind(order.status.as_str())
        .bind(order.payment_method.as_ref().map(|m| m.as_str().to_string()))
        .bind(&order.tracking_code)
        .bind(&order.tracking_url)
        .bind(order.cancellation.as_ref().map(Json))
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_overdue_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE status = 'PENDING' AND created_at < $1 \
             ORDER BY created_at ASC LIMIT $2",
            ORDER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(created_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(order_from_row).collect()
    }
}

#[async_trait]
impl TokenStore for PostgresStore {
    async fn load(&self) -> Result<Option<CarrierToken>, StoreError> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, expires_at FROM carrier_tokens WHERE id = $1",
        )
        .bind(CARRIER_TOKEN_ROW)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<CarrierToken, StoreError> {
            Ok(CarrierToken {
                access_token: row.try_get("access_token")?,
                refresh_token: row.try_get("refresh_token")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn save(&self, token: &CarrierToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carrier_tokens (id, access_token, refresh_token, expires_at, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(CARRIER_TOKEN_ROW)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Product lookups against the `products` table
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresCatalog {
    async fn shipping_profile(&self, product_id: Uuid) -> Result<Option<ProductShippingProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT price_cents, weight_kg, height_cm, width_cm, length_cm FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let price_cents: i64 = row.try_get("price_cents")?;
        let height: Option<f64> = row.try_get("height_cm")?;
        let width: Option<f64> = row.try_get("width_cm")?;
        let length: Option<f64> = row.try_get("length_cm")?;

        let dimensions = match (height, width, length) {
            (Some(height), Some(width), Some(length)) => Some(Dimensions { height, width, length }),
            _ => None,
        };

        Ok(Some(ProductShippingProfile {
            weight_kg: row.try_get("weight_kg")?,
            dimensions,
            price: Some(price_cents as f64 / 100.0),
        }))
    }

    async fn deduct_stock(&self, items: &[OrderItem]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2")
                .bind(i64::from(item.quantity))
                .bind(item.product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
