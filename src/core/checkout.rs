//! Checkout pipeline - Turns a validated cart into an immutable order.
//!
//! The request is validated first (address and payment method), outside any
//! transaction. Then, inside one transaction:
//!
//! 1. every cart line is re-validated and repriced from current catalog data and
//!    its stock checked against the ledger;
//! 2. stock is decremented per unit in ascending unit order, quantities of lines
//!    sharing a unit summed;
//! 3. the order and its items are written and the cart is emptied.
//!
//! Returning early at any step drops the transaction, which rolls everything back:
//! stock, orders and the cart stay exactly as they were.

use crate::{
    core::{
        cart::{LineCheck, PricedLine, clear_cart_items, evaluate_line, find_cart, list_cart_items},
        stock::{decrement_locked, get_available_stock},
    },
    entities::{Order, OrderItem, order, order_item},
    errors::{Error, LineIssue, Result},
    models::{OwnerRef, PaymentMethod, StockUnit, round_money},
};
use async_trait::async_trait;
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Status of a freshly committed order; payment happens downstream.
pub const ORDER_STATUS_PENDING: &str = "pending";

/// Buyer input for a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Shipping address id from the address service
    pub address_id: Option<i64>,
    /// One of `cash_on_delivery`, `card`, `wallet`, `bank_transfer`
    pub payment_method: String,
    /// Free-form buyer notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Address service collaborator.
#[async_trait]
pub trait AddressValidator: Send + Sync {
    /// Confirms `address_id` exists and belongs to `owner`.
    async fn validate(&self, owner: &OwnerRef, address_id: i64) -> Result<()>;
}

/// Accepts every positive address id. Used when no address service is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAddresses;

#[async_trait]
impl AddressValidator for AllowAllAddresses {
    async fn validate(&self, _owner: &OwnerRef, address_id: i64) -> Result<()> {
        if address_id <= 0 {
            return Err(Error::validation(format!(
                "Invalid shipping address id {address_id}"
            )));
        }
        Ok(())
    }
}

/// A committed order with its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    /// The order header
    pub order: order::Model,
    /// Frozen line snapshots
    pub items: Vec<order_item::Model>,
}

impl OrderReceipt {
    /// Stock units the order drew from, ascending and deduplicated.
    #[must_use]
    pub fn units(&self) -> Vec<StockUnit> {
        let mut units: Vec<StockUnit> = self
            .items
            .iter()
            .map(|item| {
                item.combination_id
                    .map_or(StockUnit::Product(item.product_id), StockUnit::Combination)
            })
            .collect();
        units.sort();
        units.dedup();
        units
    }
}

fn order_number(order_id: i64, placed_at: chrono::DateTime<chrono::Utc>) -> String {
    format!("ORD-{}-{order_id:06}", placed_at.format("%Y%m%d"))
}

/// Collapses the collected issues into the error the buyer sees.
fn rejection(mut issues: Vec<LineIssue>) -> Error {
    if let [
        LineIssue::InsufficientStock {
            unit,
            requested,
            available,
            ..
        },
    ] = issues.as_slice()
    {
        return Error::InsufficientStock {
            unit: *unit,
            requested: *requested,
            available: *available,
        };
    }
    issues.sort_by_key(|issue| match issue {
        LineIssue::Unavailable { item_id, .. } | LineIssue::InsufficientStock { item_id, .. } => {
            *item_id
        }
    });
    Error::CheckoutRejected { issues }
}

/// Places an order for everything in the owner's cart.
///
/// # Errors
/// - `Validation` for a missing or rejected address, an unknown payment method
///   or an empty cart
/// - `InsufficientStock` when the only problem is one stock shortage
/// - `CheckoutRejected` listing every problem line otherwise
/// - `TransactionAborted` if the database gave up on the transaction
#[instrument(skip(db, addresses, request), fields(payment_method = %request.payment_method))]
pub async fn checkout(
    db: &DatabaseConnection,
    addresses: &dyn AddressValidator,
    owner: &OwnerRef,
    request: CheckoutRequest,
) -> Result<OrderReceipt> {
    let address_id = request
        .address_id
        .ok_or_else(|| Error::validation("A shipping address is required"))?;
    addresses.validate(owner, address_id).await?;
    let payment_method: PaymentMethod = request.payment_method.parse()?;
    let notes = request
        .notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty());

    let txn = db.begin().await?;

    // Draft -> Validated
    let cart = find_cart(&txn, owner)
        .await?
        .ok_or_else(|| Error::validation("Cart is empty"))?;
    let items = list_cart_items(&txn, cart.id).await?;
    if items.is_empty() {
        return Err(Error::validation("Cart is empty"));
    }

    let mut issues = Vec::new();
    let mut lines: Vec<PricedLine> = Vec::with_capacity(items.len());
    for item in items {
        match evaluate_line(&txn, item).await? {
            LineCheck::Priced(line) => lines.push(*line),
            LineCheck::Unavailable(issue) => issues.push(issue),
        }
    }

    let mut demand: BTreeMap<StockUnit, (i32, i64)> = BTreeMap::new();
    for line in &lines {
        let entry = demand.entry(line.unit).or_insert((0, line.item.id));
        entry.0 = entry.0.saturating_add(line.item.quantity);
    }
    for (&unit, &(requested, item_id)) in &demand {
        let available = get_available_stock(&txn, unit).await?;
        if requested > available {
            issues.push(LineIssue::InsufficientStock {
                item_id,
                unit,
                requested,
                available,
            });
        }
    }
    if !issues.is_empty() {
        warn!(cart_id = cart.id, issues = issues.len(), "Checkout rejected");
        return Err(rejection(issues));
    }

    // Validated -> Reserved
    for (&unit, &(quantity, _)) in &demand {
        decrement_locked(&txn, unit, quantity).await?;
    }

    // Reserved -> Committed
    let placed_at = chrono::Utc::now();
    let subtotal = round_money(lines.iter().map(PricedLine::total_price).sum());
    let total_items: i32 = lines.iter().map(|line| line.item.quantity).sum();
    let (user_id, session_id) = match owner {
        OwnerRef::User(user_id) => (Some(*user_id), None),
        OwnerRef::Session(token) => (None, Some(token.clone())),
    };

    let draft = order::ActiveModel {
        order_number: Set(format!("PENDING-{}-{}", cart.id, placed_at.timestamp_micros())),
        user_id: Set(user_id),
        session_id: Set(session_id),
        shipping_address_id: Set(address_id),
        payment_method: Set(payment_method.as_str().to_string()),
        notes: Set(notes),
        status: Set(ORDER_STATUS_PENDING.to_string()),
        total_items: Set(total_items),
        subtotal: Set(subtotal),
        total_amount: Set(subtotal),
        created_at: Set(placed_at),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let order_id = draft.id;
    let mut numbered: order::ActiveModel = draft.into();
    numbered.order_number = Set(order_number(order_id, placed_at));
    let order = numbered.update(&txn).await?;

    let mut order_items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product.id),
            combination_id: Set(line.combination_id),
            vendor_id: Set(line.product.vendor_id),
            selected_variants: Set(line.selection.to_json()?),
            quantity: Set(line.item.quantity),
            unit_price: Set(line.unit_price),
            total_price: Set(line.total_price()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        order_items.push(item);
    }

    clear_cart_items(&txn, cart.id).await?;
    txn.commit().await?;

    info!(
        order_id = order.id,
        order_number = %order.order_number,
        total_items,
        total = subtotal,
        "Order committed"
    );
    Ok(OrderReceipt {
        order,
        items: order_items,
    })
}

/// Loads an order with its items.
///
/// # Errors
/// Returns `NotFound` if the order does not exist.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<OrderReceipt> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))?;
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?;
    Ok(OrderReceipt { order, items })
}

/// The owner's orders, newest first.
pub async fn list_orders(db: &DatabaseConnection, owner: &OwnerRef) -> Result<Vec<order::Model>> {
    let condition = match owner {
        OwnerRef::User(user_id) => Condition::all().add(order::Column::UserId.eq(*user_id)),
        OwnerRef::Session(token) => Condition::all()
            .add(order::Column::SessionId.eq(token.as_str()))
            .add(order::Column::UserId.is_null()),
    };
    Order::find()
        .filter(condition)
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::cart::add_item;
    use crate::core::catalog::{CombinationUpdate, update_combination};
    use crate::core::product::{set_product_status, set_vendor_status};
    use crate::core::stock::decrease_stock;
    use crate::models::{CartLineInput, ProductStatus, VendorStatus};
    use crate::test_utils::*;

    const MAX: i32 = 9999;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            address_id: Some(11),
            payment_method: "card".to_string(),
            notes: Some("  leave at the door ".to_string()),
        }
    }

    struct RejectAll;

    #[async_trait]
    impl AddressValidator for RejectAll {
        async fn validate(&self, _owner: &OwnerRef, address_id: i64) -> Result<()> {
            Err(Error::validation(format!("Unknown address {address_id}")))
        }
    }

    #[tokio::test]
    async fn test_checkout_commits_order_and_clears_cart() -> Result<()> {
        let (db, product, combos, values) = setup_priced_variant_product(5).await?;
        let owner = OwnerRef::User(1);
        let ids: Vec<i64> = values.iter().map(|value| value.id).collect();
        add_item(&db, &owner, CartLineInput::with_variants(product.id, &ids, 2), MAX).await?;

        let receipt = checkout(&db, &AllowAllAddresses, &owner, request()).await?;
        assert_eq!(receipt.order.total_amount, 230.0);
        assert_eq!(receipt.order.subtotal, 230.0);
        assert_eq!(receipt.order.total_items, 2);
        assert_eq!(receipt.order.payment_method, "card");
        assert_eq!(receipt.order.notes.as_deref(), Some("leave at the door"));
        assert!(receipt.order.order_number.starts_with("ORD-"));
        assert_eq!(receipt.items[0].combination_id, Some(combos[0].id));
        assert_eq!(receipt.items[0].unit_price, 115.0);
        assert_eq!(receipt.units(), vec![StockUnit::Combination(combos[0].id)]);

        assert_eq!(
            get_available_stock(&db, StockUnit::Combination(combos[0].id)).await?,
            3
        );
        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 0);
        assert!(list_cart_items(&db, cart.id).await?.is_empty());

        let loaded = get_order(&db, receipt.order.id).await?;
        assert_eq!(loaded.order.order_number, receipt.order.order_number);
        assert_eq!(loaded.items, receipt.items);
        assert_eq!(list_orders(&db, &owner).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_shortage_leaves_everything_untouched() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(10).await?;
        let owner = OwnerRef::User(2);
        add_item(&db, &owner, CartLineInput::plain(product.id, 5), MAX).await?;
        decrease_stock(&db, StockUnit::Product(product.id), 7).await?;

        let err = checkout(&db, &AllowAllAddresses, &owner, request())
            .await
            .unwrap_err();
        match err {
            Error::InsufficientStock {
                unit,
                requested,
                available,
            } => {
                assert_eq!(unit, StockUnit::Product(product.id));
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(
            get_available_stock(&db, StockUnit::Product(product.id)).await?,
            3
        );
        let cart = find_cart(&db, &owner).await?.unwrap();
        let items = list_cart_items(&db, cart.id).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert!(list_orders(&db, &owner).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_several_problems_are_reported_per_line() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(10).await?;
        let hidden = create_test_product(&db, product.vendor_id, "Hidden", 2.0, 10).await?;
        let owner = OwnerRef::User(3);
        add_item(&db, &owner, CartLineInput::plain(product.id, 4), MAX).await?;
        add_item(&db, &owner, CartLineInput::plain(hidden.id, 1), MAX).await?;
        decrease_stock(&db, StockUnit::Product(product.id), 8).await?;
        set_product_status(&db, hidden.id, ProductStatus::Inactive).await?;

        let err = checkout(&db, &AllowAllAddresses, &owner, request())
            .await
            .unwrap_err();
        let issues = match err {
            Error::CheckoutRejected { issues } => issues,
            other => panic!("expected a rejection, got {other}"),
        };
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|issue| matches!(issue, LineIssue::Unavailable { .. })));
        assert!(
            issues
                .iter()
                .any(|issue| matches!(issue, LineIssue::InsufficientStock { requested: 4, available: 2, .. }))
        );
        assert_eq!(
            get_available_stock(&db, StockUnit::Product(product.id)).await?,
            2
        );
        Ok(())
    }

    async fn assert_rejected_as_unavailable(
        db: &DatabaseConnection,
        owner: &OwnerRef,
        unit: StockUnit,
        stock: i32,
    ) -> Result<()> {
        let err = checkout(db, &AllowAllAddresses, owner, request())
            .await
            .unwrap_err();
        let issues = match err {
            Error::CheckoutRejected { issues } => issues,
            other => panic!("expected a rejection, got {other}"),
        };
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], LineIssue::Unavailable { .. }));

        assert_eq!(get_available_stock(db, unit).await?, stock);
        let cart = find_cart(db, owner).await?.unwrap();
        let items = list_cart_items(db, cart.id).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert!(list_orders(db, owner).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_combination_is_rejected() -> Result<()> {
        let (db, product, combos, values) = setup_sized_product(5).await?;
        let owner = OwnerRef::User(6);
        add_item(
            &db,
            &owner,
            CartLineInput::with_variants(product.id, &[values[1].id], 2),
            MAX,
        )
        .await?;
        update_combination(
            &db,
            combos[1].id,
            CombinationUpdate {
                price_modifier: None,
                is_active: Some(false),
            },
        )
        .await?;

        assert_rejected_as_unavailable(&db, &owner, StockUnit::Combination(combos[1].id), 5).await
    }

    #[tokio::test]
    async fn test_unapproved_vendor_is_rejected() -> Result<()> {
        let (db, vendor, product) = setup_with_product(5).await?;
        let owner = OwnerRef::Session("guest-7".to_string());
        add_item(&db, &owner, CartLineInput::plain(product.id, 2), MAX).await?;
        set_vendor_status(&db, vendor.id, VendorStatus::Suspended).await?;

        assert_rejected_as_unavailable(&db, &owner, StockUnit::Product(product.id), 5).await
    }

    #[tokio::test]
    async fn test_request_validation_happens_first() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(10).await?;
        let owner = OwnerRef::User(4);

        let empty = checkout(&db, &AllowAllAddresses, &owner, request()).await;
        assert!(matches!(empty.unwrap_err(), Error::Validation { .. }));

        add_item(&db, &owner, CartLineInput::plain(product.id, 1), MAX).await?;
        let no_address = checkout(
            &db,
            &AllowAllAddresses,
            &owner,
            CheckoutRequest {
                address_id: None,
                ..request()
            },
        )
        .await;
        assert!(matches!(no_address.unwrap_err(), Error::Validation { .. }));

        let bad_payment = checkout(
            &db,
            &AllowAllAddresses,
            &owner,
            CheckoutRequest {
                payment_method: "barter".to_string(),
                ..request()
            },
        )
        .await;
        assert!(matches!(bad_payment.unwrap_err(), Error::Validation { .. }));

        let rejected_address = checkout(&db, &RejectAll, &owner, request()).await;
        assert!(matches!(
            rejected_address.unwrap_err(),
            Error::Validation { .. }
        ));
        assert_eq!(
            get_available_stock(&db, StockUnit::Product(product.id)).await?,
            10
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_multi_line_checkout_decrements_each_unit() -> Result<()> {
        let (db, product, combos, values) = setup_sized_colored_product(3).await?;
        let owner = OwnerRef::User(5);
        add_item(
            &db,
            &owner,
            CartLineInput::with_variants(product.id, &[values[0].id, values[2].id], 2),
            MAX,
        )
        .await?;
        add_item(
            &db,
            &owner,
            CartLineInput::with_variants(product.id, &[values[1].id, values[3].id], 3),
            MAX,
        )
        .await?;

        let receipt = checkout(&db, &AllowAllAddresses, &owner, request()).await?;
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.order.total_items, 5);
        // combinations are generated size-major: S-Red, S-Blue, M-Red, M-Blue
        assert_eq!(
            get_available_stock(&db, StockUnit::Combination(combos[0].id)).await?,
            1
        );
        assert_eq!(
            get_available_stock(&db, StockUnit::Combination(combos[3].id)).await?,
            0
        );
        assert_eq!(
            get_available_stock(&db, StockUnit::Combination(combos[1].id)).await?,
            3
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_for_last_unit() -> Result<()> {
        let (db, product, combos, values) = setup_priced_variant_product(1).await?;
        let ids: Vec<i64> = values.iter().map(|value| value.id).collect();
        let buyers = [OwnerRef::User(10), OwnerRef::Session("guest-10".to_string())];
        for buyer in &buyers {
            add_item(&db, buyer, CartLineInput::with_variants(product.id, &ids, 1), MAX).await?;
        }

        let mut handles = Vec::new();
        for buyer in buyers.clone() {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                checkout(&db, &AllowAllAddresses, &buyer, request()).await
            }));
        }

        let mut orders = 0;
        let mut losers = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => orders += 1,
                Err(Error::InsufficientStock { available: 0, .. }) => losers += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(orders, 1);
        assert_eq!(losers, 1);
        assert_eq!(
            get_available_stock(&db, StockUnit::Combination(combos[0].id)).await?,
            0
        );
        Ok(())
    }
}
