//! Supply intake - Vendor restock events feeding the stock ledger.
//!
//! Each supply writes one `supply_records` row and one ledger increment in the
//! same transaction. Batches run every item in its own transaction, so one bad
//! line never blocks its siblings.

use crate::{
    core::{
        catalog::{get_combination_by_id, product_has_combinations},
        product::{get_product_by_id, get_vendor_by_id},
        stock::increase_stock,
    },
    entities::{SupplyRecord, supply_record},
    errors::{Error, Result},
    models::StockUnit,
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// One restock as submitted by a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyInput {
    /// Supplying vendor
    pub vendor_id: i64,
    /// Restocked product
    pub product_id: i64,
    /// Restocked combination; required when the product has combinations
    #[serde(default)]
    pub combination_id: Option<i64>,
    /// Units received
    pub quantity: i32,
}

/// Result of a recorded supply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyReceipt {
    /// The appended supply record
    pub record: supply_record::Model,
    /// Unit that was restocked
    pub unit: StockUnit,
    /// Stock level right after the increment
    pub stock_level: i32,
}

/// Outcome of one batch item.
#[derive(Debug)]
pub struct BatchItemReport {
    /// Position in the submitted batch
    pub index: usize,
    /// The submitted item
    pub input: SupplyInput,
    /// Receipt or the error that rolled this item back
    pub outcome: Result<SupplyReceipt>,
}

/// Per-item report of a batch.
#[derive(Debug, Default)]
pub struct SupplyBatchReport {
    /// One entry per submitted item, in submission order
    pub items: Vec<BatchItemReport>,
}

impl SupplyBatchReport {
    /// Number of items that were recorded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.outcome.is_ok()).count()
    }

    /// Number of items that were rolled back.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

/// Records a restock and increments the ledger atomically.
///
/// # Errors
/// - `Validation` if the quantity is not positive, or the product has
///   combinations and none was named
/// - `NotFound` for an unknown vendor, product or combination (including a
///   combination of another product)
/// - `Unauthorized` if the product belongs to another vendor
#[instrument(skip(db))]
pub async fn record_supply(db: &DatabaseConnection, input: SupplyInput) -> Result<SupplyReceipt> {
    if input.quantity <= 0 {
        return Err(Error::validation(format!(
            "Supplied quantity must be positive, got {}",
            input.quantity
        )));
    }

    let txn = db.begin().await?;

    if get_vendor_by_id(&txn, input.vendor_id).await?.is_none() {
        return Err(Error::not_found("vendor", input.vendor_id));
    }
    let product = get_product_by_id(&txn, input.product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", input.product_id))?;
    if product.vendor_id != input.vendor_id {
        return Err(Error::Unauthorized {
            message: format!(
                "Vendor {} does not own product {}",
                input.vendor_id, product.id
            ),
        });
    }

    let unit = match input.combination_id {
        Some(combination_id) => {
            let combination = get_combination_by_id(&txn, combination_id)
                .await?
                .filter(|combination| combination.product_id == product.id)
                .ok_or_else(|| Error::not_found("combination", combination_id))?;
            StockUnit::Combination(combination.id)
        }
        None => {
            if product_has_combinations(&txn, product.id).await? {
                return Err(Error::validation(format!(
                    "Product {} is stocked per combination; name the combination supplied",
                    product.id
                )));
            }
            StockUnit::Product(product.id)
        }
    };

    let record = supply_record::ActiveModel {
        vendor_id: Set(input.vendor_id),
        product_id: Set(product.id),
        combination_id: Set(input.combination_id),
        quantity_supplied: Set(input.quantity),
        supply_date: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let stock_level = increase_stock(&txn, unit, input.quantity, "supply").await?;

    txn.commit().await?;
    info!(
        supply_id = record.id,
        %unit,
        quantity = input.quantity,
        stock_level,
        "Supply recorded"
    );
    Ok(SupplyReceipt {
        record,
        unit,
        stock_level,
    })
}

/// Records several restocks, each in its own transaction.
pub async fn record_supply_batch(
    db: &DatabaseConnection,
    inputs: Vec<SupplyInput>,
) -> SupplyBatchReport {
    let mut report = SupplyBatchReport::default();
    for (index, input) in inputs.into_iter().enumerate() {
        let outcome = record_supply(db, input.clone()).await;
        if let Err(e) = &outcome {
            warn!(index, product_id = input.product_id, error = %e, "Supply item rejected");
        }
        report.items.push(BatchItemReport {
            index,
            input,
            outcome,
        });
    }
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Supply batch processed"
    );
    report
}

/// A vendor's supply history, newest first.
pub async fn list_supply_records(
    db: &DatabaseConnection,
    vendor_id: i64,
) -> Result<Vec<supply_record::Model>> {
    SupplyRecord::find()
        .filter(supply_record::Column::VendorId.eq(vendor_id))
        .order_by_desc(supply_record::Column::SupplyDate)
        .order_by_desc(supply_record::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::stock::get_available_stock;
    use crate::test_utils::*;

    fn supply(vendor_id: i64, product_id: i64, quantity: i32) -> SupplyInput {
        SupplyInput {
            vendor_id,
            product_id,
            combination_id: None,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_record_supply_increments_stock() -> Result<()> {
        let (db, vendor, product) = setup_with_product(2).await?;

        let receipt = record_supply(&db, supply(vendor.id, product.id, 8)).await?;
        assert_eq!(receipt.stock_level, 10);
        assert_eq!(receipt.record.quantity_supplied, 8);
        assert_eq!(
            get_available_stock(&db, StockUnit::Product(product.id)).await?,
            10
        );
        assert_eq!(list_supply_records(&db, vendor.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_vendor_is_unauthorized() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(2).await?;
        let other = create_test_vendor(&db, "Other").await?;

        let result = record_supply(&db, supply(other.id, product.id, 1)).await;
        assert!(matches!(result.unwrap_err(), Error::Unauthorized { .. }));
        assert_eq!(
            get_available_stock(&db, StockUnit::Product(product.id)).await?,
            2
        );
        assert!(list_supply_records(&db, other.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_combination_supply_rules() -> Result<()> {
        let (db, product, combos, _values) = setup_sized_product(1).await?;

        let missing_combination = record_supply(&db, supply(product.vendor_id, product.id, 3)).await;
        assert!(matches!(
            missing_combination.unwrap_err(),
            Error::Validation { .. }
        ));

        let receipt = record_supply(
            &db,
            SupplyInput {
                combination_id: Some(combos[1].id),
                ..supply(product.vendor_id, product.id, 3)
            },
        )
        .await?;
        assert_eq!(receipt.unit, StockUnit::Combination(combos[1].id));
        assert_eq!(receipt.stock_level, 4);

        let foreign = create_test_product(&db, product.vendor_id, "Plain", 5.0, 0).await?;
        let wrong_product = record_supply(
            &db,
            SupplyInput {
                combination_id: Some(combos[0].id),
                ..supply(product.vendor_id, foreign.id, 1)
            },
        )
        .await;
        assert!(matches!(wrong_product.unwrap_err(), Error::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_items_are_independent() -> Result<()> {
        let (db, vendor, product) = setup_with_product(0).await?;

        let report = record_supply_batch(
            &db,
            vec![
                supply(vendor.id, product.id, 5),
                supply(vendor.id, product.id, 0),
                supply(vendor.id, 9_999, 1),
                supply(vendor.id, product.id, 2),
            ],
        )
        .await;

        assert_eq!(report.items.len(), 4);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 2);
        assert!(matches!(
            report.items[1].outcome,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(report.items[2].outcome, Err(Error::NotFound { .. })));
        assert_eq!(
            get_available_stock(&db, StockUnit::Product(product.id)).await?,
            7
        );

        let history = list_supply_records(&db, vendor.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].quantity_supplied, 2);
        Ok(())
    }
}
