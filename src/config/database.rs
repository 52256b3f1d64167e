//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Composite uniqueness rules that entities cannot express (one cart line
//! per variant set, one combination per variant set, unique SKU suffixes) are added
//! as explicit indexes.

use crate::entities::{
    Cart, CartColumn, CartItem, CartItemColumn, CombinationVariant, Order, OrderItem, Product, SupplyRecord,
    VariantCombination, VariantCombinationColumn, VariantType, VariantValue, Vendor,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Default database location used when neither the config file nor `DATABASE_URL` set one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.sqlite?mode=rwc";

/// Gets the database URL from the environment, falling back to `configured`.
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        configured
            .map_or_else(|| DEFAULT_DATABASE_URL.to_string(), ToString::to_string)
    })
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(location) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = location.split('?').next().unwrap_or(location);
    if let Some(parent) = Path::new(file)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Establishes a connection to the database at `database_url`.
///
/// `SQLite` in-memory databases live inside a single connection, so the pool is
/// pinned to exactly one connection for them.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_dir(database_url)?;
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    let db = Database::connect(options).await?;
    debug!("Connected to database");
    Ok(db)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

fn composite_indexes() -> Vec<IndexCreateStatement> {
    vec![
        // one cart per owner; NULLs stay distinct, so each column only binds its own kind
        Index::create()
            .name("idx_carts_unique_user")
            .table(Cart)
            .col(CartColumn::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_carts_unique_session")
            .table(Cart)
            .col(CartColumn::SessionId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_cart_items_unique_selection")
            .table(CartItem)
            .col(CartItemColumn::CartId)
            .col(CartItemColumn::ProductId)
            .col(CartItemColumn::VariantKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_combinations_unique_variant_set")
            .table(VariantCombination)
            .col(VariantCombinationColumn::ProductId)
            .col(VariantCombinationColumn::VariantKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_combinations_unique_sku_suffix")
            .table(VariantCombination)
            .col(VariantCombinationColumn::ProductId)
            .col(VariantCombinationColumn::SkuSuffix)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates all tables and composite indexes if they do not exist yet.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Vendor).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, VariantType).await?;
    create_table(db, &schema, VariantValue).await?;
    create_table(db, &schema, VariantCombination).await?;
    create_table(db, &schema, CombinationVariant).await?;
    create_table(db, &schema, Cart).await?;
    create_table(db, &schema, CartItem).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, SupplyRecord).await?;

    let builder = db.get_database_backend();
    for index in composite_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    info!("Database tables ensured");
    Ok(())
}
