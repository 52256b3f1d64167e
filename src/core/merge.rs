//! Cart merge - Reconciles a client-held cart into the server cart.
//!
//! Each incoming line is normalized, matched against the server cart by
//! `(product, variant set)` and written at the summed quantity. When the ledger
//! knows the unit's stock and the sum exceeds it, the line is clamped to what is
//! available and reported as adjusted; a clamp to zero removes (or never creates)
//! the line. Lines that cannot be interpreted are rejected with a reason while the
//! rest of the merge proceeds. Everything runs in one transaction.

use crate::{
    core::{
        cart::{find_line, get_or_create_cart, quote_line, recompute_totals, write_line},
        catalog::{product_has_combinations, resolve_selection},
        product::get_product_by_id,
        stock::get_available_stock,
    },
    entities::CartItem,
    errors::{Error, Result},
    models::{CartLineInput, OwnerRef},
};
use sea_orm::{TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// What happened to one incoming line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// Added to an existing server line
    Merged,
    /// Created a new server line
    Added,
    /// Written at a lower quantity than requested
    QuantityAdjusted,
    /// Not written
    Rejected,
}

/// Per-line merge result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Position in the incoming list
    pub index: usize,
    /// Product of the incoming line
    pub product_id: i64,
    /// Canonical variant key; empty for bare products and rejected lines
    pub variant_key: String,
    /// Resulting status
    pub status: MergeStatus,
    /// Quantity the merged line asked for (server + incoming)
    pub requested: i32,
    /// Quantity written to the server cart
    pub quantity: i32,
    /// Why the line was adjusted or rejected
    pub reason: Option<String>,
}

/// Outcome of a merge, grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Server cart the lines were merged into
    pub cart_id: i64,
    /// Lines added to existing server lines
    pub merged: Vec<MergeOutcome>,
    /// Lines that created new server lines
    pub added: Vec<MergeOutcome>,
    /// Lines clamped to available stock or to the per-line maximum
    pub adjusted: Vec<MergeOutcome>,
    /// Lines that were not written
    pub rejected: Vec<MergeOutcome>,
}

impl MergeReport {
    fn push(&mut self, outcome: MergeOutcome) {
        match outcome.status {
            MergeStatus::Merged => self.merged.push(outcome),
            MergeStatus::Added => self.added.push(outcome),
            MergeStatus::QuantityAdjusted => self.adjusted.push(outcome),
            MergeStatus::Rejected => self.rejected.push(outcome),
        }
    }
}

fn rejected(index: usize, line: &CartLineInput, reason: impl Into<String>) -> MergeOutcome {
    MergeOutcome {
        index,
        product_id: line.product_id,
        variant_key: String::new(),
        status: MergeStatus::Rejected,
        requested: line.quantity,
        quantity: 0,
        reason: Some(reason.into()),
    }
}

/// Merges `incoming` lines into the owner's server cart.
///
/// # Errors
/// Only database failures abort the merge; invalid lines are reported in
/// [`MergeReport::rejected`].
#[instrument(skip(db, incoming), fields(lines = incoming.len()))]
pub async fn merge_cart(
    db: &DatabaseConnection,
    owner: &OwnerRef,
    incoming: Vec<CartLineInput>,
    max_quantity: i32,
) -> Result<MergeReport> {
    let txn = db.begin().await?;
    let cart = get_or_create_cart(&txn, owner).await?;
    let mut report = MergeReport {
        cart_id: cart.id,
        ..MergeReport::default()
    };

    for (index, line) in incoming.into_iter().enumerate() {
        if line.quantity <= 0 {
            report.push(rejected(index, &line, "quantity must be positive"));
            continue;
        }
        let Some(product) = get_product_by_id(&txn, line.product_id).await? else {
            report.push(rejected(index, &line, "product not found"));
            continue;
        };
        if !product.is_active() {
            report.push(rejected(index, &line, "product is not active"));
            continue;
        }

        let variants = line.selected_variants.clone().unwrap_or_default();
        let selection = match resolve_selection(&txn, product.id, variants).await {
            Ok(selection) => selection,
            Err(e @ (Error::NotFound { .. } | Error::Validation { .. } | Error::Conflict { .. })) => {
                report.push(rejected(index, &line, e.to_string()));
                continue;
            }
            Err(e) => return Err(e),
        };
        if selection.is_empty() && product_has_combinations(&txn, product.id).await? {
            report.push(rejected(index, &line, "a variant selection is required"));
            continue;
        }
        let key = selection.key();

        let existing = find_line(&txn, cart.id, product.id, &key).await?;
        let quote = quote_line(&txn, &product, &selection).await?;
        let available = match quote.unit {
            Some(unit) => Some(get_available_stock(&txn, unit).await?),
            None => None,
        };

        let requested = existing
            .as_ref()
            .map_or(line.quantity, |existing| existing.quantity.saturating_add(line.quantity));
        let (quantity, reason) = clamp(requested, available, max_quantity);
        let status = if reason.is_some() {
            MergeStatus::QuantityAdjusted
        } else if existing.is_some() {
            MergeStatus::Merged
        } else {
            MergeStatus::Added
        };

        if quantity == 0 {
            if let Some(existing) = existing {
                CartItem::delete_by_id(existing.id).exec(&txn).await?;
            }
        } else {
            write_line(
                &txn,
                cart.id,
                product.id,
                &selection,
                quantity,
                quote.unit_price,
                existing,
            )
            .await?;
        }

        debug!(
            index,
            product_id = product.id,
            unit = ?quote.unit,
            requested,
            quantity,
            ?status,
            "Merged cart line"
        );
        report.push(MergeOutcome {
            index,
            product_id: product.id,
            variant_key: key,
            status,
            requested,
            quantity,
            reason,
        });
    }

    recompute_totals(&txn, cart.id).await?;
    txn.commit().await?;

    info!(
        cart_id = cart.id,
        merged = report.merged.len(),
        added = report.added.len(),
        adjusted = report.adjusted.len(),
        rejected = report.rejected.len(),
        "Cart merged"
    );
    Ok(report)
}

/// Quantity to write for a merged line and, when lowered, why.
fn clamp(requested: i32, available: Option<i32>, max_quantity: i32) -> (i32, Option<String>) {
    match available {
        Some(available) if requested > available => {
            let quantity = available.clamp(0, max_quantity);
            (quantity, Some("insufficient stock".to_string()))
        }
        _ if requested > max_quantity => (
            max_quantity,
            Some(format!("exceeds the per-line maximum of {max_quantity}")),
        ),
        _ => (requested, None),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::cart::{find_cart, list_cart_items};
    use crate::models::SelectedVariant;
    use crate::test_utils::*;

    const MAX: i32 = 9999;

    #[test]
    fn test_clamp_rules() {
        assert_eq!(clamp(5, Some(3), MAX), (3, Some("insufficient stock".to_string())));
        assert_eq!(clamp(5, Some(0), MAX).0, 0);
        assert_eq!(clamp(5, None, MAX), (5, None));
        assert_eq!(clamp(5, Some(9), MAX), (5, None));
        assert_eq!(clamp(12, None, 10).0, 10);
    }

    #[tokio::test]
    async fn test_merging_same_line_twice_sums_quantities() -> Result<()> {
        let (db, product, _combos, values) = setup_sized_colored_product(20).await?;
        let owner = OwnerRef::User(1);
        let (size, color) = (values[1].id, values[3].id);

        let first = merge_cart(
            &db,
            &owner,
            vec![CartLineInput::with_variants(product.id, &[color, size], 2)],
            MAX,
        )
        .await?;
        assert_eq!(first.added.len(), 1);

        let second = merge_cart(
            &db,
            &owner,
            vec![CartLineInput::with_variants(product.id, &[size, color], 3)],
            MAX,
        )
        .await?;
        assert_eq!(second.merged.len(), 1);
        assert_eq!(second.merged[0].quantity, 5);

        let cart = find_cart(&db, &owner).await?.unwrap();
        let items = list_cart_items(&db, cart.id).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert_eq!(cart.total_items, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_clamps_to_available_stock() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(3).await?;
        let owner = OwnerRef::Session("guest".to_string());

        let report = merge_cart(&db, &owner, vec![CartLineInput::plain(product.id, 5)], MAX).await?;
        assert_eq!(report.adjusted.len(), 1);
        let outcome = &report.adjusted[0];
        assert_eq!(outcome.status, MergeStatus::QuantityAdjusted);
        assert_eq!(outcome.requested, 5);
        assert_eq!(outcome.quantity, 3);
        assert_eq!(outcome.reason.as_deref(), Some("insufficient stock"));

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_clamp_to_zero_drops_line_but_is_reported() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(0).await?;
        let owner = OwnerRef::User(2);

        let report = merge_cart(&db, &owner, vec![CartLineInput::plain(product.id, 2)], MAX).await?;
        assert_eq!(report.adjusted.len(), 1);
        assert_eq!(report.adjusted[0].quantity, 0);

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert!(list_cart_items(&db, cart.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_lines_are_rejected_without_aborting() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(5).await?;
        let owner = OwnerRef::User(3);
        let duplicate = SelectedVariant {
            id: 7,
            name: String::new(),
            value: String::new(),
            additional_price: 0.0,
        };

        let report = merge_cart(
            &db,
            &owner,
            vec![
                CartLineInput::plain(404, 1),
                CartLineInput::plain(product.id, 0),
                CartLineInput {
                    product_id: product.id,
                    selected_variants: Some(vec![duplicate.clone(), duplicate]),
                    quantity: 1,
                },
                CartLineInput::with_variants(product.id, &[12_345], 1),
                CartLineInput::plain(product.id, 2),
            ],
            MAX,
        )
        .await?;

        assert_eq!(report.rejected.len(), 4);
        assert_eq!(report.added.len(), 1);
        assert!(report.rejected.iter().all(|outcome| outcome.reason.is_some()));

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_bare_line_for_variant_product_is_rejected() -> Result<()> {
        let (db, product, _combos, values) = setup_sized_product(5).await?;
        let owner = OwnerRef::Session("guest-5".to_string());

        let report = merge_cart(
            &db,
            &owner,
            vec![
                CartLineInput::plain(product.id, 2),
                CartLineInput::with_variants(product.id, &[values[0].id], 2),
            ],
            MAX,
        )
        .await?;
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 0);
        assert_eq!(
            report.rejected[0].reason.as_deref(),
            Some("a variant selection is required")
        );
        assert!(report.adjusted.is_empty());
        assert_eq!(report.added.len(), 1);

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_combination_keeps_requested_quantity() -> Result<()> {
        let (db, product, combos, values) = setup_sized_colored_product(1).await?;
        let owner = OwnerRef::User(4);

        // Two sizes never form a combination, so availability is unknown.
        let report = merge_cart(
            &db,
            &owner,
            vec![CartLineInput::with_variants(product.id, &[values[0].id, values[1].id], 4)],
            MAX,
        )
        .await?;
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].quantity, 4);
        assert!(!combos.is_empty());
        Ok(())
    }
}
