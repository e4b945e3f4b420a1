use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use storefront_fulfillment::carrier::{http_client, CarrierClient, CarrierGateway, TokenManager};
use storefront_fulfillment::catalog::{InMemoryCatalog, ProductCatalog, ProductShippingProfile};
use storefront_fulfillment::domain::order::{
    ExpirySweeper, NewOrder, OrderCommand, OrderCommandHandler, OrderItem, PaymentMethod, ShippingAddress,
};
use storefront_fulfillment::domain::shipping::{ShippingItem, ShippingService};
use storefront_fulfillment::metrics::{self, Metrics};
use storefront_fulfillment::notifications::{LogNotifier, StatusNotifier, WebhookNotifier};
use storefront_fulfillment::persistence::{
    InMemoryOrderRepository, InMemoryTokenStore, OrderRepository, PostgresCatalog, PostgresStore, TokenStore,
};
use storefront_fulfillment::utils::{Clock, SystemClock};
use storefront_fulfillment::AppConfig;

struct Stores {
    orders: Arc<dyn OrderRepository>,
    tokens: Arc<dyn TokenStore>,
    catalog: Arc<dyn ProductCatalog>,
    demo_catalog: Option<Arc<InMemoryCatalog>>,
}

async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PostgresStore::connect(url, config.database.max_connections).await?;
            store.init().await?;
            let catalog = PostgresCatalog::new(store.pool().clone());
            let store = Arc::new(store);
            Ok(Stores {
                orders: store.clone(),
                tokens: store,
                catalog: Arc::new(catalog),
                demo_catalog: None,
            })
        }
        None => {
            tracing::warn!("No database configured, using in-memory stores");
            let catalog = Arc::new(InMemoryCatalog::new());
            Ok(Stores {
                orders: Arc::new(InMemoryOrderRepository::new()),
                tokens: Arc::new(InMemoryTokenStore::new()),
                catalog: catalog.clone(),
                demo_catalog: Some(catalog),
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront_fulfillment=debug")),
        )
        .init();

    tracing::info!("Starting storefront fulfillment");

    let config = AppConfig::load()?;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    if config.metrics.enabled {
        let registry = Arc::new(metrics.registry().clone());
        let port = config.metrics.port;
        std::thread::spawn(move || match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(async {
                if let Err(e) = metrics::start_metrics_server(registry, port).await {
                    tracing::error!(error = %e, "Metrics server error");
                }
            }),
            Err(e) => tracing::error!(error = %e, "Metrics runtime could not start"),
        });
    }

    // === 2. Stores ===
    let stores = open_stores(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // === 3. Carrier ===
    let http = http_client(&config.carrier)?;
    let tokens = TokenManager::new(stores.tokens.clone(), http.clone(), &config.carrier, clock.clone())
        .with_metrics(metrics.clone());
    tokens.seed(&config.carrier).await?;
    let carrier: Arc<dyn CarrierGateway> = Arc::new(
        CarrierClient::new(http, &config.carrier, Arc::new(tokens)).with_metrics(metrics.clone()),
    );

    let shipping = ShippingService::new(
        carrier,
        stores.catalog.clone(),
        config.pickup.clone(),
        config.carrier.origin_zip.clone(),
    );

    // === 4. Orders ===
    let notifier: Arc<dyn StatusNotifier> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), &config.notifications)?),
        None => Arc::new(LogNotifier),
    };

    let handler = Arc::new(
        OrderCommandHandler::new(
            stores.orders.clone(),
            stores.catalog.clone(),
            notifier,
            clock,
            config.orders.payment_window(),
        )
        .with_metrics(metrics.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = config.orders.sweep_interval_secs.map(|secs| {
        ExpirySweeper::new(
            handler.clone(),
            std::time::Duration::from_secs(secs.max(1)),
            config.orders.sweep_batch_size,
        )
        .spawn(shutdown_rx)
    });

    // === 5. Demonstrate checkout -> payment -> shipment ===
    let product_id = Uuid::new_v4();
    if let Some(catalog) = &stores.demo_catalog {
        catalog
            .insert(
                product_id,
                ProductShippingProfile {
                    weight_kg: Some(0.6),
                    dimensions: None,
                    price: Some(49.9),
                },
                25,
            )
            .await;
    }

    let quote = shipping
        .quote_items(&[ShippingItem::new(product_id, 2)], "20040-020")
        .await;
    tracing::info!(
        options = quote.options.len(),
        carrier_available = quote.carrier_available,
        "Checkout shipping options ready"
    );

    // First carrier option, or pickup when the carrier gave nothing.
    let Some(chosen) = quote.options.first().cloned() else {
        anyhow::bail!("no shipping option available");
    };

    let order = handler
        .create_order(NewOrder {
            customer_id: Some(Uuid::new_v4()),
            items: vec![OrderItem {
                product_id,
                name: "Ceramic mug".to_string(),
                quantity: 2,
                unit_price_cents: 4990,
            }],
            shipping_address: ShippingAddress {
                recipient: "Demo Customer".to_string(),
                street: "Avenida Rio Branco".to_string(),
                number: Some("1".to_string()),
                complement: None,
                district: Some("Centro".to_string()),
                city: "Rio de Janeiro".to_string(),
                state: "RJ".to_string(),
                zip: "20040020".to_string(),
                shipping_option: chosen,
            },
            discount_cents: 0,
        })
        .await?;

    handler
        .execute(
            order.id,
            OrderCommand::ConfirmPayment {
                payment_method: PaymentMethod::new("pix"),
            },
        )
        .await?;
    handler.execute(order.id, OrderCommand::StartPicking).await?;
    let shipped = handler
        .execute(
            order.id,
            OrderCommand::Ship {
                tracking_code: Some("DEMO123456BR".to_string()),
                tracking_url: None,
            },
        )
        .await?;

    let tracking = shipping
        .track(&shipped.tracking_code.iter().cloned().collect::<Vec<_>>())
        .await;
    tracing::info!(
        order_number = %shipped.order_number,
        status = %shipped.status,
        tracking_entries = tracking.len(),
        "Demo order shipped"
    );

    if let Some(catalog) = &stores.demo_catalog {
        tracing::info!(stock = ?catalog.stock(product_id).await, "Stock after payment");
    }

    // === 6. Run until Ctrl+C ===
    if config.metrics.enabled || sweeper.is_some() {
        tracing::info!("Running; press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
    }

    // Receiver may already be gone if the sweeper was never started.
    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper {
        task.await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
