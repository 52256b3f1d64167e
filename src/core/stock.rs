//! Stock ledger - Authoritative stock counts per stock unit.
//!
//! A stock unit is either a bare product or one variant combination. Increments
//! are a single additive `UPDATE`, so concurrent restocks never lose updates.
//! Decrements lock the row, re-check availability and apply a conditional update
//! (`stock = stock - qty WHERE stock >= qty`); the count can never go negative
//! even on engines without row locks.

use crate::{
    core::{
        cache::CachePort,
        catalog::find_combination_by_variant_set,
    },
    entities::{Product, VariantCombination, product, variant_combination},
    errors::{Error, Result},
    models::{StockUnit, VariantSelection},
};
use sea_orm::{QuerySelect, TransactionTrait, prelude::*, sea_query::Expr};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "Quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}

fn unit_not_found(unit: StockUnit) -> Error {
    match unit {
        StockUnit::Product(id) => Error::not_found("product", id),
        StockUnit::Combination(id) => Error::not_found("combination", id),
    }
}

/// Reads a unit's stock, optionally taking an exclusive row lock.
async fn read_stock<C>(db: &C, unit: StockUnit, lock: bool) -> Result<i32>
where
    C: ConnectionTrait,
{
    let stock = match unit {
        StockUnit::Product(id) => {
            let mut query = Product::find_by_id(id);
            if lock {
                query = query.lock_exclusive();
            }
            query.one(db).await?.map(|product| product.stock)
        }
        StockUnit::Combination(id) => {
            let mut query = VariantCombination::find_by_id(id);
            if lock {
                query = query.lock_exclusive();
            }
            query.one(db).await?.map(|combination| combination.stock)
        }
    };
    stock.ok_or_else(|| unit_not_found(unit))
}

/// Authoritative stock of a unit.
///
/// # Errors
/// Returns `NotFound` if the product or combination does not exist.
pub async fn get_available_stock<C>(db: &C, unit: StockUnit) -> Result<i32>
where
    C: ConnectionTrait,
{
    read_stock(db, unit, false).await
}

/// Atomically adds `quantity` units and returns the new level.
///
/// Runs on whatever connection or transaction it is given; supply intake calls it
/// inside the transaction that records the supply.
///
/// # Errors
/// - `Validation` if `quantity` is not positive
/// - `NotFound` if the unit does not exist
#[instrument(skip(db))]
pub async fn increase_stock<C>(db: &C, unit: StockUnit, quantity: i32, cause: &str) -> Result<i32>
where
    C: ConnectionTrait,
{
    validate_quantity(quantity)?;
    let now = chrono::Utc::now();

    let updated = match unit {
        StockUnit::Product(id) => {
            Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(id))
                .exec(db)
                .await?
        }
        StockUnit::Combination(id) => {
            VariantCombination::update_many()
                .col_expr(
                    variant_combination::Column::Stock,
                    Expr::col(variant_combination::Column::Stock).add(quantity),
                )
                .col_expr(variant_combination::Column::UpdatedAt, Expr::value(now))
                .filter(variant_combination::Column::Id.eq(id))
                .exec(db)
                .await?
        }
    };
    if updated.rows_affected == 0 {
        return Err(unit_not_found(unit));
    }

    let level = read_stock(db, unit, false).await?;
    info!(%unit, quantity, cause, level, "Stock increased");
    Ok(level)
}

/// Decrements stock inside the caller's transaction and returns the remaining level.
///
/// The row is locked (`SELECT ... FOR UPDATE` where the backend supports it),
/// re-read, checked, then updated with a `stock >= quantity` guard. A guard miss is
/// reported exactly like a failed check. Nothing changes on error.
///
/// # Errors
/// - `Validation` if `quantity` is not positive
/// - `NotFound` if the unit does not exist
/// - `InsufficientStock` if fewer than `quantity` units are available
pub async fn decrement_locked<C>(txn: &C, unit: StockUnit, quantity: i32) -> Result<i32>
where
    C: ConnectionTrait,
{
    validate_quantity(quantity)?;

    let available = read_stock(txn, unit, true).await?;
    if available < quantity {
        return Err(Error::InsufficientStock {
            unit,
            requested: quantity,
            available,
        });
    }

    let now = chrono::Utc::now();
    let updated = match unit {
        StockUnit::Product(id) => {
            Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(id))
                .filter(product::Column::Stock.gte(quantity))
                .exec(txn)
                .await?
        }
        StockUnit::Combination(id) => {
            VariantCombination::update_many()
                .col_expr(
                    variant_combination::Column::Stock,
                    Expr::col(variant_combination::Column::Stock).sub(quantity),
                )
                .col_expr(variant_combination::Column::UpdatedAt, Expr::value(now))
                .filter(variant_combination::Column::Id.eq(id))
                .filter(variant_combination::Column::Stock.gte(quantity))
                .exec(txn)
                .await?
        }
    };

    if updated.rows_affected == 0 {
        let available = read_stock(txn, unit, false).await?;
        return Err(Error::InsufficientStock {
            unit,
            requested: quantity,
            available,
        });
    }

    debug!(%unit, quantity, remaining = available - quantity, "Stock decremented");
    Ok(available - quantity)
}

/// Decrements stock in its own transaction and returns the remaining level.
///
/// # Errors
/// See [`decrement_locked`]; a database abort surfaces as `TransactionAborted`.
#[instrument(skip(db))]
pub async fn decrease_stock(db: &DatabaseConnection, unit: StockUnit, quantity: i32) -> Result<i32> {
    let txn = db.begin().await?;
    let remaining = decrement_locked(&txn, unit, quantity).await?;
    txn.commit().await?;
    info!(%unit, quantity, remaining, "Stock decreased");
    Ok(remaining)
}

/// Stock unit a product/selection pair draws from.
///
/// An empty selection is the bare product. A non-empty selection maps to the
/// combination with exactly that variant set, or `None` when no such combination
/// exists.
pub async fn resolve_stock_unit<C>(
    db: &C,
    product_id: i64,
    selection: &VariantSelection,
) -> Result<Option<StockUnit>>
where
    C: ConnectionTrait,
{
    if selection.is_empty() {
        return Ok(Some(StockUnit::Product(product_id)));
    }
    let combination = find_combination_by_variant_set(db, product_id, &selection.ids()).await?;
    Ok(combination.map(|combination| StockUnit::Combination(combination.id)))
}

/// Cached stock hint for display purposes. Falls back to the database on a miss
/// or a cache failure and repopulates the cache with `ttl`.
///
/// Never use this where correctness depends on the count; merge and checkout read
/// the ledger directly.
pub async fn available_hint(
    cache: &dyn CachePort,
    db: &DatabaseConnection,
    unit: StockUnit,
    ttl: Duration,
) -> Result<i32> {
    let key = unit.cache_key();
    match cache.get(&key).await {
        Ok(Some(hint)) => {
            if let Ok(hint) = i32::try_from(hint) {
                return Ok(hint);
            }
            warn!(%key, hint, "Cached stock hint out of range, ignoring");
        }
        Ok(None) => {}
        Err(e) => warn!(%key, error = %e, "Stock hint cache read failed"),
    }

    let stock = get_available_stock(db, unit).await?;
    if let Err(e) = cache.set(&key, i64::from(stock), Some(ttl)).await {
        warn!(%key, error = %e, "Stock hint cache write failed");
    }
    Ok(stock)
}

/// Drops the cached hint of a unit after its stock changed.
pub async fn invalidate_hint(cache: &dyn CachePort, unit: StockUnit) {
    let key = unit.cache_key();
    if let Err(e) = cache.invalidate(&key).await {
        warn!(%key, error = %e, "Stock hint invalidation failed");
    }
}
