use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use storefront_fulfillment::carrier::{CarrierGateway, PICKUP_OPTION_ID};
use storefront_fulfillment::catalog::{InMemoryCatalog, ProductShippingProfile};
use storefront_fulfillment::config::PickupConfig;
use storefront_fulfillment::domain::order::{
    NewOrder, Order, OrderCommand, OrderCommandHandler, OrderError, OrderItem, OrderStatus, PaymentMethod,
    ShippingAddress,
};
use storefront_fulfillment::domain::shipping::{
    Parcel, PickupPoint, ShippingItem, ShippingOption, ShippingService, TrackingInfo,
};
use storefront_fulfillment::notifications::{NotifyError, StatusNotifier};
use storefront_fulfillment::persistence::{InMemoryOrderRepository, OrderRepository};
use storefront_fulfillment::utils::{Clock, FixedClock};

// ============================================================================
// Checkout -> payment -> fulfilment through the public API
// ============================================================================

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, OrderStatus)>>,
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn notify_status_change(&self, order: &Order, status: OrderStatus, _extra: Value) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((order.order_number.clone(), status));
        Ok(())
    }
}

/// Carrier that is down
struct OfflineCarrier;

#[async_trait]
impl CarrierGateway for OfflineCarrier {
    async fn quote(&self, _parcel: &Parcel, _destination_zip: &str, _origin_zip: &str) -> Option<Vec<ShippingOption>> {
        None
    }

    async fn pickup_points(&self, _zip: &str) -> Vec<PickupPoint> {
        Vec::new()
    }

    async fn track(&self, _codes: &[String]) -> Vec<TrackingInfo> {
        Vec::new()
    }
}

struct Store {
    handler: Arc<OrderCommandHandler>,
    repository: Arc<InMemoryOrderRepository>,
    catalog: Arc<InMemoryCatalog>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<FixedClock>,
    shipping: ShippingService,
}

fn store() -> Store {
    let repository = Arc::new(InMemoryOrderRepository::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(FixedClock::new(Utc::now()));

    let handler = Arc::new(OrderCommandHandler::new(
        repository.clone(),
        catalog.clone(),
        notifier.clone(),
        clock.clone(),
        Duration::minutes(15),
    ));
    let shipping = ShippingService::new(
        Arc::new(OfflineCarrier),
        catalog.clone(),
        PickupConfig::default(),
        "01310-100",
    );

    Store {
        handler,
        repository,
        catalog,
        notifier,
        clock,
        shipping,
    }
}

fn checkout(product_id: Uuid, option: ShippingOption) -> NewOrder {
    NewOrder {
        customer_id: None,
        items: vec![OrderItem {
            product_id,
            name: "Linen apron".to_string(),
            quantity: 3,
            unit_price_cents: 8900,
        }],
        shipping_address: ShippingAddress {
            recipient: "Joana Lima".to_string(),
            street: "Rua da Bahia".to_string(),
            number: Some("1200".to_string()),
            complement: None,
            district: Some("Centro".to_string()),
            city: "Belo Horizonte".to_string(),
            state: "MG".to_string(),
            zip: "30160-012".to_string(),
            shipping_option: option,
        },
        discount_cents: 0,
    }
}

#[tokio::test]
async fn pickup_checkout_survives_carrier_outage() {
    let s = store();
    let product_id = Uuid::new_v4();
    s.catalog
        .insert(product_id, ProductShippingProfile::default(), 7)
        .await;

    let quote = s
        .shipping
        .quote_items(&[ShippingItem::new(product_id, 3)], "30160-012")
        .await;
    assert!(!quote.carrier_available);
    assert_eq!(quote.options.len(), 1);
    assert_eq!(quote.options[0].id, PICKUP_OPTION_ID);

    let order = s
        .handler
        .create_order(checkout(product_id, quote.options[0].clone()))
        .await
        .unwrap();
    assert_eq!(order.shipping_cents, 0);
    assert_eq!(order.total_cents, 26700);

    let paid = s
        .handler
        .execute(
            order.id,
            OrderCommand::ConfirmPayment {
                payment_method: PaymentMethod::new("credit_card"),
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Confirmed);
    assert!(paid.paid_at.is_some());
    assert_eq!(s.catalog.stock(product_id).await, Some(4));

    s.handler.execute(order.id, OrderCommand::StartPicking).await.unwrap();
    s.handler
        .execute(
            order.id,
            OrderCommand::Ship {
                tracking_code: None,
                tracking_url: None,
            },
        )
        .await
        .unwrap();
    s.handler.execute(order.id, OrderCommand::MarkDelivered).await.unwrap();

    let sent: Vec<OrderStatus> = s.notifier.sent.lock().unwrap().iter().map(|(_, st)| *st).collect();
    assert_eq!(
        sent,
        vec![
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ]
    );
}

#[tokio::test]
async fn unpaid_order_expires_on_next_read() {
    let s = store();
    let order = s
        .handler
        .create_order(checkout(Uuid::new_v4(), PickupConfig::default().option()))
        .await
        .unwrap();

    s.clock.advance(Duration::minutes(16));

    // Storage still says PENDING until someone looks.
    let stored = s.repository.find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);

    let read = s.handler.get(order.id).await.unwrap();
    assert_eq!(read.status, OrderStatus::Cancelled);
    assert_eq!(read.cancelled_at, Some(s.clock.now()));

    let err = s
        .handler
        .execute(
            order.id,
            OrderCommand::ConfirmPayment {
                payment_method: PaymentMethod::new("pix"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PaymentWindowExpired));
}

#[tokio::test]
async fn concurrent_admin_actions_yield_one_transition() {
    let s = store();
    let order = s
        .handler
        .create_order(checkout(Uuid::new_v4(), PickupConfig::default().option()))
        .await
        .unwrap();
    s.handler
        .execute(
            order.id,
            OrderCommand::ConfirmPayment {
                payment_method: PaymentMethod::new("pix"),
            },
        )
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        s.handler.execute(order.id, OrderCommand::StartPicking),
        s.handler.execute(order.id, OrderCommand::StartPicking),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(
        loser,
        OrderError::StaleState { .. } | OrderError::InvalidTransition { .. }
    ));
    assert_eq!(
        s.handler.get(order.id).await.unwrap().status,
        OrderStatus::Processing
    );
}

#[tokio::test]
async fn terminal_orders_reject_everything() {
    let s = store();
    let order = s
        .handler
        .create_order(checkout(Uuid::new_v4(), PickupConfig::default().option()))
        .await
        .unwrap();

    let refunded = s
        .handler
        .execute(order.id, OrderCommand::Refund { reason: Some("chargeback".into()) })
        .await
        .unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);

    for command in [
        OrderCommand::StartPicking,
        OrderCommand::Cancel { reason: None },
        OrderCommand::MarkDelivered,
    ] {
        let err = s.handler.execute(order.id, command).await.unwrap_err();
        assert!(matches!(err, OrderError::Closed(OrderStatus::Refunded)));
    }
}
