use std::sync::Arc;

use crate::carrier::{compose_options, CarrierGateway};
use crate::catalog::ProductCatalog;
use crate::config::PickupConfig;

use super::package::{aggregate, enrich_item};
use super::value_objects::{Parcel, PickupPoint, ShippingItem, ShippingOption, TrackingInfo};

// ============================================================================
// Shipping Service
// ============================================================================
//
// Checkout-facing composition of the shipping pieces:
//
//   items -> catalog defaults -> parcel -> carrier rates -> + pickup option
//
// Nothing here returns an error. A failed catalog lookup falls back to the
// aggregation defaults; a failed carrier call leaves only the pickup option.
//
// ============================================================================

/// Options offered at checkout along with the parcel they were priced for
#[derive(Debug, Clone)]
pub struct ShippingQuote {
    pub parcel: Parcel,
    pub options: Vec<ShippingOption>,
    /// False when the carrier could not be consulted
    pub carrier_available: bool,
}

pub struct ShippingService {
    carrier: Arc<dyn CarrierGateway>,
    catalog: Arc<dyn ProductCatalog>,
    pickup: PickupConfig,
    origin_zip: String,
}

impl ShippingService {
    pub fn new(
        carrier: Arc<dyn CarrierGateway>,
        catalog: Arc<dyn ProductCatalog>,
        pickup: PickupConfig,
        origin_zip: impl Into<String>,
    ) -> Self {
        Self {
            carrier,
            catalog,
            pickup,
            origin_zip: origin_zip.into(),
        }
    }

    pub async fn quote_items(&self, items: &[ShippingItem], destination_zip: &str) -> ShippingQuote {
        let mut enriched = Vec::with_capacity(items.len());
        for item in items {
            enriched.push(self.enrich(item.clone()).await);
        }

        let parcel = aggregate(&enriched);
        let quoted = self
            .carrier
            .quote(&parcel, destination_zip, &self.origin_zip)
            .await;

        let carrier_available = quoted.is_some();
        let options = compose_options(quoted.unwrap_or_default(), self.pickup.option());

        tracing::info!(
            items = items.len(),
            weight_grams = parcel.total_weight_grams,
            options = options.len(),
            carrier_available,
            "Shipping quote composed"
        );

        ShippingQuote {
            parcel,
            options,
            carrier_available,
        }
    }

    pub async fn pickup_points(&self, zip: &str) -> Vec<PickupPoint> {
        self.carrier.pickup_points(zip).await
    }

    pub async fn track(&self, codes: &[String]) -> Vec<TrackingInfo> {
        self.carrier.track(codes).await
    }

    async fn enrich(&self, item: ShippingItem) -> ShippingItem {
        if item.weight_kg.is_some() && item.dimensions.is_some() && item.price.is_some() {
            return item;
        }

        match self.catalog.shipping_profile(item.product_id).await {
            Ok(profile) => enrich_item(item, profile.as_ref()),
            Err(e) => {
                tracing::warn!(
                    product_id = %item.product_id,
                    error = %e,
                    "Product lookup failed, using shipping defaults"
                );
                item
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::PICKUP_OPTION_ID;
    use crate::catalog::{InMemoryCatalog, ProductShippingProfile};
    use crate::domain::shipping::Dimensions;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Carrier double returning canned rates and recording the parcel it saw
    struct StubCarrier {
        rates: Option<Vec<ShippingOption>>,
        seen: Mutex<Vec<Parcel>>,
    }

    impl StubCarrier {
        fn new(rates: Option<Vec<ShippingOption>>) -> Self {
            Self {
                rates,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CarrierGateway for StubCarrier {
        async fn quote(&self, parcel: &Parcel, _destination_zip: &str, _origin_zip: &str) -> Option<Vec<ShippingOption>> {
            self.seen.lock().unwrap().push(*parcel);
            self.rates.clone()
        }

        async fn pickup_points(&self, _zip: &str) -> Vec<PickupPoint> {
            Vec::new()
        }

        async fn track(&self, _codes: &[String]) -> Vec<TrackingInfo> {
            Vec::new()
        }
    }

    fn rate(id: &str, price: f64) -> ShippingOption {
        ShippingOption {
            id: id.to_string(),
            service: format!("Service {}", id),
            carrier: "Carrier".to_string(),
            price,
            eta_days: Some(3),
            pickup: Some(false),
            notes: None,
        }
    }

    fn service(carrier: Arc<StubCarrier>, catalog: Arc<InMemoryCatalog>) -> ShippingService {
        ShippingService::new(carrier, catalog, PickupConfig::default(), "01310-100")
    }

    fn pickups(options: &[ShippingOption]) -> usize {
        options.iter().filter(|o| o.is_pickup()).count()
    }

    #[tokio::test]
    async fn test_carrier_failure_leaves_pickup_only() {
        let carrier = Arc::new(StubCarrier::new(None));
        let shipping = service(carrier, Arc::new(InMemoryCatalog::new()));

        let quote = shipping
            .quote_items(&[ShippingItem::new(Uuid::new_v4(), 1)], "20040-020")
            .await;

        assert!(!quote.carrier_available);
        assert_eq!(quote.options.len(), 1);
        assert_eq!(quote.options[0].id, PICKUP_OPTION_ID);
        assert_eq!(quote.options[0].price, 0.0);
    }

    #[tokio::test]
    async fn test_duplicate_rates_collapse_and_pickup_appended() {
        let carrier = Arc::new(StubCarrier::new(Some(vec![
            rate("1", 25.9),
            rate("1", 27.0),
            rate("2", 31.5),
        ])));
        let shipping = service(carrier, Arc::new(InMemoryCatalog::new()));

        let quote = shipping
            .quote_items(&[ShippingItem::new(Uuid::new_v4(), 1)], "20040-020")
            .await;

        let ids: Vec<&str> = quote.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", PICKUP_OPTION_ID]);
        assert_eq!(quote.options[0].price, 25.9);
        assert_eq!(pickups(&quote.options), 1);
    }

    #[tokio::test]
    async fn test_catalog_fills_missing_item_data() {
        let product_id = Uuid::new_v4();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog
            .insert(
                product_id,
                ProductShippingProfile {
                    weight_kg: Some(0.8),
                    dimensions: Some(Dimensions {
                        height: 4.0,
                        width: 15.0,
                        length: 20.0,
                    }),
                    price: Some(59.9),
                },
                10,
            )
            .await;

        let carrier = Arc::new(StubCarrier::new(Some(Vec::new())));
        let shipping = service(carrier.clone(), catalog);

        shipping
            .quote_items(&[ShippingItem::new(product_id, 2)], "20040-020")
            .await;

        let parcel = carrier.seen.lock().unwrap()[0];
        assert_eq!(parcel.total_weight_grams, 1600);
        assert_eq!(parcel.length, 40.0);
        assert_eq!(parcel.width, 15.0);
        assert_eq!(parcel.height, 5.0);
        assert_eq!(parcel.total_price, 119.8);
    }

    #[tokio::test]
    async fn test_caller_values_win_over_catalog() {
        let product_id = Uuid::new_v4();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog
            .insert(
                product_id,
                ProductShippingProfile {
                    weight_kg: Some(5.0),
                    dimensions: None,
                    price: None,
                },
                1,
            )
            .await;

        let carrier = Arc::new(StubCarrier::new(Some(Vec::new())));
        let shipping = service(carrier.clone(), catalog);

        shipping
            .quote_items(&[ShippingItem::new(product_id, 1).with_weight_kg(0.25)], "20040-020")
            .await;

        assert_eq!(carrier.seen.lock().unwrap()[0].total_weight_grams, 250);
    }
}
