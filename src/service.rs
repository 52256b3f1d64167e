//! Storefront service - The boundary the outer layers call.
//!
//! [`Storefront`] owns the database handle, the stock-hint cache, the address
//! validator and the settings. It forwards to the `core` functions, retries
//! operations whose transaction the database aborted (with exponential backoff)
//! and drops cached stock hints after every committed stock movement.

use crate::{
    config::settings::Settings,
    core::{
        cache::{CachePort, MemoryCache, NoopCache},
        cart::{self, CartSummary},
        catalog::{self, CombinationUpdate, VariantGroup, VariantValueInput},
        checkout::{self, AddressValidator, AllowAllAddresses, CheckoutRequest, OrderReceipt},
        merge::{self, MergeReport},
        stock,
        supply::{self, SupplyBatchReport, SupplyInput, SupplyReceipt},
    },
    entities::{
        cart_item, order, supply_record, variant_combination, variant_type, variant_value,
    },
    errors::Result,
    models::{CartLineInput, OwnerRef, SelectedVariant, StockUnit},
};
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Inventory, cart and checkout operations over one database.
pub struct Storefront {
    db: DatabaseConnection,
    cache: Arc<dyn CachePort>,
    addresses: Arc<dyn AddressValidator>,
    settings: Settings,
}

impl Storefront {
    /// Builds a storefront with the cache chosen by `settings.cache.enabled` and an
    /// address validator that accepts every positive id.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        let cache: Arc<dyn CachePort> = if settings.cache.enabled {
            Arc::new(MemoryCache::new())
        } else {
            Arc::new(NoopCache)
        };
        Self {
            db,
            cache,
            addresses: Arc::new(AllowAllAddresses),
            settings,
        }
    }

    /// Replaces the stock-hint cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CachePort>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the address validator.
    #[must_use]
    pub fn with_address_validator(mut self, addresses: Arc<dyn AddressValidator>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Underlying database connection.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    fn max_quantity(&self) -> i32 {
        self.settings.cart.max_quantity_per_line
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32 << attempt.saturating_sub(1).min(10);
        self.settings.checkout.backoff().saturating_mul(factor)
    }

    /// Runs `operation`, retrying while it fails with a retryable error.
    async fn with_retry<T, F, Fut>(&self, name: &'static str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.settings.checkout.max_retries => {
                    attempt += 1;
                    let delay = self.retry_delay(attempt);
                    warn!(operation = name, attempt, ?delay, error = %e, "Retrying aborted transaction");
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn invalidate(&self, units: &[StockUnit]) {
        for &unit in units {
            stock::invalidate_hint(self.cache.as_ref(), unit).await;
        }
    }

    // Variant catalog

    /// Creates the configured variant types that are missing.
    pub async fn seed_variant_types(&self) -> Result<usize> {
        catalog::seed_variant_types(&self.db, &self.settings.variant_types).await
    }

    /// Creates a variant type.
    pub async fn create_variant_type(
        &self,
        name: &str,
        display_name: &str,
        sort_order: i32,
    ) -> Result<variant_type::Model> {
        catalog::create_variant_type(&self.db, name, display_name, sort_order).await
    }

    /// Lists variant types in display order.
    pub async fn list_variant_types(&self) -> Result<Vec<variant_type::Model>> {
        catalog::list_variant_types(&self.db).await
    }

    /// Deletes an unused variant type.
    pub async fn delete_variant_type(&self, variant_type_id: i64) -> Result<()> {
        catalog::delete_variant_type(&self.db, variant_type_id).await
    }

    /// Adds or re-prices a product's variant value.
    pub async fn add_variant_value(
        &self,
        product_id: i64,
        variant_type_id: i64,
        input: VariantValueInput,
    ) -> Result<variant_value::Model> {
        catalog::add_variant_value(&self.db, product_id, variant_type_id, input).await
    }

    /// Lists a product's variant values.
    pub async fn list_variant_values(&self, product_id: i64) -> Result<Vec<variant_value::Model>> {
        catalog::list_variant_values(&self.db, product_id).await
    }

    /// Generates every combination of `groups` for a product.
    #[instrument(skip(self, groups))]
    pub async fn generate_combinations(
        &self,
        product_id: i64,
        groups: Vec<VariantGroup>,
        default_stock: i32,
    ) -> Result<Vec<variant_combination::Model>> {
        let db = &self.db;
        self.with_retry("generate_combinations", move || {
            catalog::generate_combinations(db, product_id, groups.clone(), default_stock)
        })
        .await
    }

    /// Lists a product's combinations.
    pub async fn list_combinations(&self, product_id: i64) -> Result<Vec<variant_combination::Model>> {
        catalog::list_combinations(&self.db, product_id).await
    }

    /// Finds the combination matching a selection exactly (order-insensitive).
    pub async fn find_combination(
        &self,
        product_id: i64,
        variant_ids: &[i64],
    ) -> Result<Option<variant_combination::Model>> {
        let mut sorted = variant_ids.to_vec();
        sorted.sort_unstable();
        catalog::find_combination_by_variant_set(&self.db, product_id, &sorted).await
    }

    /// Updates a combination's price modifier and/or activity flag.
    pub async fn update_combination(
        &self,
        combination_id: i64,
        update: CombinationUpdate,
    ) -> Result<variant_combination::Model> {
        catalog::update_combination(&self.db, combination_id, update).await
    }

    // Stock ledger

    /// Authoritative stock of a unit.
    pub async fn get_available_stock(&self, unit: StockUnit) -> Result<i32> {
        stock::get_available_stock(&self.db, unit).await
    }

    /// Cached stock hint of a unit, for display only.
    pub async fn stock_hint(&self, unit: StockUnit) -> Result<i32> {
        stock::available_hint(
            self.cache.as_ref(),
            &self.db,
            unit,
            self.settings.cache.stock_ttl(),
        )
        .await
    }

    /// Stock unit a product/selection pair draws from, if any.
    pub async fn resolve_stock_unit(
        &self,
        product_id: i64,
        selected_variants: Vec<SelectedVariant>,
    ) -> Result<Option<StockUnit>> {
        let selection = catalog::resolve_selection(&self.db, product_id, selected_variants).await?;
        stock::resolve_stock_unit(&self.db, product_id, &selection).await
    }

    /// Adds units to a unit's stock and returns the new level.
    #[instrument(skip(self))]
    pub async fn increase_stock(&self, unit: StockUnit, quantity: i32, cause: &str) -> Result<i32> {
        let db = &self.db;
        let level = self
            .with_retry("increase_stock", move || {
                stock::increase_stock(db, unit, quantity, cause)
            })
            .await?;
        self.invalidate(&[unit]).await;
        Ok(level)
    }

    /// Removes units from a unit's stock and returns the remaining level.
    #[instrument(skip(self))]
    pub async fn decrease_stock(&self, unit: StockUnit, quantity: i32) -> Result<i32> {
        let db = &self.db;
        let remaining = self
            .with_retry("decrease_stock", move || stock::decrease_stock(db, unit, quantity))
            .await?;
        self.invalidate(&[unit]).await;
        Ok(remaining)
    }

    // Supply intake

    /// Records a vendor restock.
    pub async fn record_supply(&self, input: SupplyInput) -> Result<SupplyReceipt> {
        let db = &self.db;
        let receipt = self
            .with_retry("record_supply", move || supply::record_supply(db, input.clone()))
            .await?;
        self.invalidate(&[receipt.unit]).await;
        Ok(receipt)
    }

    /// Records several restocks independently.
    pub async fn record_supply_batch(&self, inputs: Vec<SupplyInput>) -> SupplyBatchReport {
        let report = supply::record_supply_batch(&self.db, inputs).await;
        let units: Vec<StockUnit> = report
            .items
            .iter()
            .filter_map(|item| item.outcome.as_ref().ok().map(|receipt| receipt.unit))
            .collect();
        self.invalidate(&units).await;
        report
    }

    /// A vendor's supply history, newest first.
    pub async fn list_supply_records(&self, vendor_id: i64) -> Result<Vec<supply_record::Model>> {
        supply::list_supply_records(&self.db, vendor_id).await
    }

    // Cart

    /// Adds a line to the owner's cart.
    pub async fn add_item(&self, owner: &OwnerRef, line: CartLineInput) -> Result<cart_item::Model> {
        let (db, max) = (&self.db, self.max_quantity());
        self.with_retry("add_item", move || cart::add_item(db, owner, line.clone(), max))
            .await
    }

    /// Sets a line's quantity; zero removes it.
    pub async fn update_item_quantity(
        &self,
        owner: &OwnerRef,
        item_id: i64,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>> {
        cart::update_item_quantity(&self.db, owner, item_id, quantity, self.max_quantity()).await
    }

    /// Removes a line from the owner's cart.
    pub async fn remove_item(&self, owner: &OwnerRef, item_id: i64) -> Result<()> {
        cart::remove_item(&self.db, owner, item_id).await.map(|_| ())
    }

    /// Empties the owner's cart.
    pub async fn clear_cart(&self, owner: &OwnerRef) -> Result<()> {
        cart::clear_cart(&self.db, owner).await
    }

    /// Priced view of the owner's cart.
    pub async fn get_cart_summary(&self, owner: &OwnerRef) -> Result<CartSummary> {
        cart::get_cart_summary(
            &self.db,
            self.cache.as_ref(),
            owner,
            self.settings.cache.stock_ttl(),
        )
        .await
    }

    /// Merges a client-held cart into the owner's server cart.
    #[instrument(skip(self, incoming))]
    pub async fn merge_cart(&self, owner: &OwnerRef, incoming: Vec<CartLineInput>) -> Result<MergeReport> {
        let (db, max) = (&self.db, self.max_quantity());
        self.with_retry("merge_cart", move || {
            merge::merge_cart(db, owner, incoming.clone(), max)
        })
        .await
    }

    // Checkout

    /// Places an order for the owner's cart.
    #[instrument(skip(self, request))]
    pub async fn checkout(&self, owner: &OwnerRef, request: CheckoutRequest) -> Result<OrderReceipt> {
        let db = &self.db;
        let addresses = self.addresses.as_ref();
        let receipt = self
            .with_retry("checkout", move || {
                checkout::checkout(db, addresses, owner, request.clone())
            })
            .await?;
        self.invalidate(&receipt.units()).await;
        Ok(receipt)
    }

    /// Loads an order with its items.
    pub async fn get_order(&self, order_id: i64) -> Result<OrderReceipt> {
        checkout::get_order(&self.db, order_id).await
    }

    /// The owner's orders, newest first.
    pub async fn list_orders(&self, owner: &OwnerRef) -> Result<Vec<order::Model>> {
        checkout::list_orders(&self.db, owner).await
    }
}
