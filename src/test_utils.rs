//! Shared test utilities for the storefront engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating catalog fixtures with sensible defaults.

use crate::{
    config::database::{create_connection, create_tables},
    core::{
        catalog::{
            VariantGroup, VariantValueInput, create_variant_type, generate_combinations,
            list_variant_values,
        },
        product::{self, NewProduct},
    },
    entities,
    errors::Result,
    models::{SelectedVariant, VendorStatus},
};
use sea_orm::DatabaseConnection;

/// Installs a test-writer tracing subscriber. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = create_connection("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Creates an approved test vendor.
pub async fn create_test_vendor(db: &DatabaseConnection, name: &str) -> Result<entities::vendor::Model> {
    product::create_vendor(db, name, VendorStatus::Approved).await
}

/// Creates an active test product without a discount.
pub async fn create_test_product(
    db: &DatabaseConnection,
    vendor_id: i64,
    name: &str,
    price: f64,
    stock: i32,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        NewProduct {
            vendor_id,
            name: name.to_string(),
            price,
            discounted_price: None,
            stock,
        },
    )
    .await
}

/// Variant group built from `(value, additional_price)` pairs.
pub fn group(variant_type_id: i64, values: &[(&str, f64)]) -> VariantGroup {
    VariantGroup {
        variant_type_id,
        values: values
            .iter()
            .map(|&(value, additional_price)| VariantValueInput::new(value, additional_price))
            .collect(),
    }
}

/// Client-style selection of a variant value id (labels left blank).
pub fn selected(id: i64) -> SelectedVariant {
    SelectedVariant {
        id,
        name: String::new(),
        value: String::new(),
        additional_price: 0.0,
    }
}

/// Sets up a vendor and a 10.00 product holding `stock` bare units.
/// Returns (db, vendor, product).
pub async fn setup_with_product(
    stock: i32,
) -> Result<(
    DatabaseConnection,
    entities::vendor::Model,
    entities::product::Model,
)> {
    let db = setup_test_db().await?;
    let vendor = create_test_vendor(&db, "Test Vendor").await?;
    let product = create_test_product(&db, vendor.id, "Test Product", 10.0, stock).await?;
    Ok((db, vendor, product))
}

type VariantFixture = (
    DatabaseConnection,
    entities::product::Model,
    Vec<entities::variant_combination::Model>,
    Vec<entities::variant_value::Model>,
);

async fn setup_variant_product(price: f64, groups: &[&[(&str, f64)]], stock: i32) -> Result<VariantFixture> {
    let db = setup_test_db().await?;
    let vendor = create_test_vendor(&db, "Variant Vendor").await?;
    let product = create_test_product(&db, vendor.id, "Tee", price, 0).await?;

    let mut variant_groups = Vec::with_capacity(groups.len());
    for (position, values) in groups.iter().enumerate() {
        let sort_order = i32::try_from(position).unwrap_or(i32::MAX);
        let variant_type = create_variant_type(
            &db,
            &format!("axis{position}"),
            &format!("Axis {position}"),
            sort_order,
        )
        .await?;
        variant_groups.push(group(variant_type.id, values));
    }

    let combinations = generate_combinations(&db, product.id, variant_groups, stock).await?;
    let values = list_variant_values(&db, product.id).await?;
    Ok((db, product, combinations, values))
}

/// Product with a single axis of sizes S, M, L (no surcharges), each
/// combination holding `stock` units.
pub async fn setup_sized_product(stock: i32) -> Result<VariantFixture> {
    setup_variant_product(20.0, &[&[("S", 0.0), ("M", 0.0), ("L", 0.0)]], stock).await
}

/// Product with sizes S, M and colors Red, Blue. Values are returned as
/// `[S, M, Red, Blue]`, combinations as S-Red, S-Blue, M-Red, M-Blue.
pub async fn setup_sized_colored_product(stock: i32) -> Result<VariantFixture> {
    setup_variant_product(
        20.0,
        &[&[("S", 0.0), ("M", 0.0)], &[("Red", 0.0), ("Blue", 0.0)]],
        stock,
    )
    .await
}

/// 100.00 product with one combination, Large (+10.00) and Blue (+5.00).
pub async fn setup_priced_variant_product(stock: i32) -> Result<VariantFixture> {
    setup_variant_product(100.0, &[&[("Large", 10.0)], &[("Blue", 5.0)]], stock).await
}
