//! Cart aggregate - Server-side carts owned by a user or a guest session.
//!
//! A cart holds at most one line per `(product, variant set)`; adding the same
//! selection again adds to that line. Line prices are always computed here from
//! current catalog data (effective price + variant surcharges + combination price
//! modifier), never taken from the client, and the cart totals are recomputed
//! after every mutation.

use crate::{
    core::{
        cache::CachePort,
        catalog::{find_combination_by_variant_set, product_has_combinations, resolve_selection},
        product::{get_product_by_id, get_vendor_by_id},
        stock::{available_hint, get_available_stock},
    },
    entities::{Cart, CartItem, cart, cart_item, product, variant_combination},
    errors::{Error, LineIssue, Result},
    models::{CartLineInput, OwnerRef, SelectedVariant, StockUnit, VariantSelection, round_money},
};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

fn owner_condition(owner: &OwnerRef) -> Condition {
    match owner {
        OwnerRef::User(user_id) => Condition::all().add(cart::Column::UserId.eq(*user_id)),
        OwnerRef::Session(token) => Condition::all()
            .add(cart::Column::SessionId.eq(token.as_str()))
            .add(cart::Column::UserId.is_null()),
    }
}

fn validate_owner(owner: &OwnerRef) -> Result<()> {
    match owner {
        OwnerRef::Session(token) if token.trim().is_empty() => {
            Err(Error::validation("Session token cannot be empty"))
        }
        _ => Ok(()),
    }
}

fn validate_line_quantity(quantity: i32, max_quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "Quantity must be positive, got {quantity}"
        )));
    }
    if quantity > max_quantity {
        return Err(Error::validation(format!(
            "Quantity {quantity} exceeds the per-line maximum of {max_quantity}"
        )));
    }
    Ok(())
}

/// Finds the owner's cart, if any.
pub async fn find_cart<C>(db: &C, owner: &OwnerRef) -> Result<Option<cart::Model>>
where
    C: ConnectionTrait,
{
    Cart::find()
        .filter(owner_condition(owner))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the owner's cart, creating an empty one on first use.
pub async fn get_or_create_cart<C>(db: &C, owner: &OwnerRef) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    validate_owner(owner)?;
    if let Some(cart) = find_cart(db, owner).await? {
        return Ok(cart);
    }

    let (user_id, session_id) = match owner {
        OwnerRef::User(user_id) => (Some(*user_id), None),
        OwnerRef::Session(token) => (None, Some(token.clone())),
    };
    let now = chrono::Utc::now();
    let cart = cart::ActiveModel {
        user_id: Set(user_id),
        session_id: Set(session_id),
        total_items: Set(0),
        total_amount: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    debug!(cart_id = cart.id, %owner, "Cart created");
    Ok(cart)
}

/// Lines of a cart in insertion order.
pub async fn list_cart_items<C>(db: &C, cart_id: i64) -> Result<Vec<cart_item::Model>>
where
    C: ConnectionTrait,
{
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The line of a cart holding exactly this product and variant set.
pub(crate) async fn find_line<C>(
    db: &C,
    cart_id: i64,
    product_id: i64,
    key: &str,
) -> Result<Option<cart_item::Model>>
where
    C: ConnectionTrait,
{
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .filter(cart_item::Column::VariantKey.eq(key))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Writes a line at the given quantity, updating `existing` when present.
pub(crate) async fn write_line<C>(
    db: &C,
    cart_id: i64,
    product_id: i64,
    selection: &VariantSelection,
    quantity: i32,
    unit_price: f64,
    existing: Option<cart_item::Model>,
) -> Result<cart_item::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let total_price = round_money(unit_price * f64::from(quantity));
    let snapshot = selection.to_json()?;

    if let Some(existing) = existing {
        let mut line: cart_item::ActiveModel = existing.into();
        line.quantity = Set(quantity);
        line.unit_price = Set(unit_price);
        line.total_price = Set(total_price);
        line.selected_variants = Set(snapshot);
        line.updated_at = Set(now);
        return line.update(db).await.map_err(Into::into);
    }

    cart_item::ActiveModel {
        cart_id: Set(cart_id),
        product_id: Set(product_id),
        variant_key: Set(selection.key()),
        selected_variants: Set(snapshot),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        total_price: Set(total_price),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Recomputes `total_items` and `total_amount` from the cart's lines.
///
/// # Errors
/// Returns `NotFound` if the cart does not exist.
pub async fn recompute_totals<C>(db: &C, cart_id: i64) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    let cart = Cart::find_by_id(cart_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart", cart_id))?;
    let items = list_cart_items(db, cart_id).await?;

    let total_items: i32 = items.iter().map(|item| item.quantity).sum();
    let total_amount = round_money(items.iter().map(|item| item.total_price).sum());

    let mut cart: cart::ActiveModel = cart.into();
    cart.total_items = Set(total_items);
    cart.total_amount = Set(total_amount);
    cart.updated_at = Set(chrono::Utc::now());
    cart.update(db).await.map_err(Into::into)
}

/// Price and stock unit of a product/selection pair under current catalog data.
#[derive(Debug, Clone)]
pub(crate) struct LineQuote {
    /// Unit the line draws from; `None` when no combination matches the selection
    pub unit: Option<StockUnit>,
    /// Matched combination
    pub combination: Option<variant_combination::Model>,
    /// Effective price + surcharges + combination price modifier
    pub unit_price: f64,
}

pub(crate) async fn quote_line<C>(
    db: &C,
    product: &product::Model,
    selection: &VariantSelection,
) -> Result<LineQuote>
where
    C: ConnectionTrait,
{
    let combination = if selection.is_empty() {
        None
    } else {
        find_combination_by_variant_set(db, product.id, &selection.ids()).await?
    };
    let unit = if selection.is_empty() {
        Some(StockUnit::Product(product.id))
    } else {
        combination
            .as_ref()
            .map(|combination| StockUnit::Combination(combination.id))
    };
    let modifier = combination
        .as_ref()
        .map_or(0.0, |combination| combination.price_modifier);
    let unit_price =
        round_money(product.effective_price() + selection.additional_total() + modifier);

    Ok(LineQuote {
        unit,
        combination,
        unit_price,
    })
}

/// The unit a line being written draws from.
///
/// # Errors
/// - `Validation` for a bare line on a product sold by combination
/// - `NotFound` when no combination matches the selection
/// - `Conflict` when the matched combination is inactive
async fn purchasable_unit<C>(
    db: &C,
    product_id: i64,
    selection: &VariantSelection,
    quote: &LineQuote,
) -> Result<StockUnit>
where
    C: ConnectionTrait,
{
    if selection.is_empty() && product_has_combinations(db, product_id).await? {
        return Err(Error::validation(format!(
            "Product {product_id} requires a variant selection"
        )));
    }
    if quote
        .combination
        .as_ref()
        .is_some_and(|combination| !combination.is_active)
    {
        return Err(Error::conflict(format!(
            "The selected variant combination of product {product_id} is inactive"
        )));
    }
    quote.unit.ok_or_else(|| {
        Error::not_found(
            "combination",
            format!("variant set {} of product {product_id}", selection.key()),
        )
    })
}

/// A cart line that can be bought, priced from current catalog data.
#[derive(Debug, Clone)]
pub(crate) struct PricedLine {
    pub item: cart_item::Model,
    pub product: product::Model,
    pub selection: VariantSelection,
    pub combination_id: Option<i64>,
    pub unit: StockUnit,
    pub unit_price: f64,
}

impl PricedLine {
    pub fn total_price(&self) -> f64 {
        round_money(self.unit_price * f64::from(self.item.quantity))
    }
}

/// Whether a stored cart line can still be bought.
#[derive(Debug, Clone)]
pub(crate) enum LineCheck {
    Priced(Box<PricedLine>),
    Unavailable(LineIssue),
}

fn unavailable(item: &cart_item::Model, reason: &str) -> LineCheck {
    LineCheck::Unavailable(LineIssue::Unavailable {
        item_id: item.id,
        product_id: item.product_id,
        reason: reason.to_string(),
    })
}

/// Re-validates a stored line against the catalog: the product must exist and be
/// active, its vendor approved, and a variant set must match an active combination.
pub(crate) async fn evaluate_line<C>(db: &C, item: cart_item::Model) -> Result<LineCheck>
where
    C: ConnectionTrait,
{
    let Some(product) = get_product_by_id(db, item.product_id).await? else {
        return Ok(unavailable(&item, "product no longer exists"));
    };
    if !product.is_active() {
        return Ok(unavailable(&item, "product is not active"));
    }
    let approved = get_vendor_by_id(db, product.vendor_id)
        .await?
        .is_some_and(|vendor| vendor.is_approved());
    if !approved {
        return Ok(unavailable(&item, "vendor is not approved"));
    }

    let Ok(stored) = VariantSelection::from_json(item.selected_variants.as_ref()) else {
        return Ok(unavailable(&item, "stored variant selection is unreadable"));
    };
    let selection = match resolve_selection(db, product.id, stored.variants().to_vec()).await {
        Ok(selection) => selection,
        Err(Error::NotFound { .. } | Error::Validation { .. } | Error::Conflict { .. }) => {
            return Ok(unavailable(&item, "selected variant is no longer offered"));
        }
        Err(e) => return Err(e),
    };
    if selection.is_empty() && product_has_combinations(db, product.id).await? {
        return Ok(unavailable(&item, "a variant selection is required"));
    }

    let quote = quote_line(db, &product, &selection).await?;
    if quote
        .combination
        .as_ref()
        .is_some_and(|combination| !combination.is_active)
    {
        return Ok(unavailable(&item, "variant combination is inactive"));
    }
    let Some(unit) = quote.unit else {
        return Ok(unavailable(&item, "no combination matches the selected variants"));
    };

    Ok(LineCheck::Priced(Box::new(PricedLine {
        combination_id: quote.combination.map(|combination| combination.id),
        item,
        product,
        selection,
        unit,
        unit_price: quote.unit_price,
    })))
}

/// Adds a line to the owner's cart, merging into an identical line.
///
/// # Errors
/// - `Validation` for a non-positive quantity or one above `max_quantity`
///   (counting what the line already holds)
/// - `Validation` for a bare line on a product that has combinations
/// - `NotFound` for an unknown product or variant value, or a variant set no
///   combination matches
/// - `Conflict` if the product or the matched combination is inactive
/// - `InsufficientStock` if the resulting quantity exceeds the ledger
#[instrument(skip(db, line), fields(product_id = line.product_id, quantity = line.quantity))]
pub async fn add_item(
    db: &DatabaseConnection,
    owner: &OwnerRef,
    line: CartLineInput,
    max_quantity: i32,
) -> Result<cart_item::Model> {
    validate_owner(owner)?;
    validate_line_quantity(line.quantity, max_quantity)?;

    let txn = db.begin().await?;

    let product = get_product_by_id(&txn, line.product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", line.product_id))?;
    if !product.is_active() {
        return Err(Error::conflict(format!(
            "Product {} is not available",
            product.id
        )));
    }

    let selection =
        resolve_selection(&txn, product.id, line.selected_variants.unwrap_or_default()).await?;
    let quote = quote_line(&txn, &product, &selection).await?;
    let unit = purchasable_unit(&txn, product.id, &selection, &quote).await?;

    let cart = get_or_create_cart(&txn, owner).await?;
    let existing = find_line(&txn, cart.id, product.id, &selection.key()).await?;
    let quantity = existing
        .as_ref()
        .map_or(line.quantity, |existing| existing.quantity.saturating_add(line.quantity));
    validate_line_quantity(quantity, max_quantity)?;

    let available = get_available_stock(&txn, unit).await?;
    if quantity > available {
        return Err(Error::InsufficientStock {
            unit,
            requested: quantity,
            available,
        });
    }

    let item = write_line(
        &txn,
        cart.id,
        product.id,
        &selection,
        quantity,
        quote.unit_price,
        existing,
    )
    .await?;
    recompute_totals(&txn, cart.id).await?;
    txn.commit().await?;

    info!(cart_id = cart.id, item_id = item.id, quantity, "Cart line written");
    Ok(item)
}

async fn owned_item<C>(db: &C, owner: &OwnerRef, item_id: i64) -> Result<cart_item::Model>
where
    C: ConnectionTrait,
{
    let cart = find_cart(db, owner)
        .await?
        .ok_or_else(|| Error::not_found("cart item", item_id))?;
    CartItem::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart item", item_id))
}

/// Sets a line's quantity; zero removes the line. Returns the line if it remains.
///
/// # Errors
/// - `NotFound` if the line does not belong to the owner's cart, or its variant
///   set no longer matches a combination
/// - `Validation` for a negative quantity or one above `max_quantity`
/// - `InsufficientStock` if the ledger holds fewer units
#[instrument(skip(db))]
pub async fn update_item_quantity(
    db: &DatabaseConnection,
    owner: &OwnerRef,
    item_id: i64,
    quantity: i32,
    max_quantity: i32,
) -> Result<Option<cart_item::Model>> {
    if quantity < 0 {
        return Err(Error::validation(format!(
            "Quantity cannot be negative, got {quantity}"
        )));
    }
    if quantity > 0 {
        validate_line_quantity(quantity, max_quantity)?;
    }

    let txn = db.begin().await?;
    let item = owned_item(&txn, owner, item_id).await?;
    let cart_id = item.cart_id;

    if quantity == 0 {
        CartItem::delete_by_id(item.id).exec(&txn).await?;
        recompute_totals(&txn, cart_id).await?;
        txn.commit().await?;
        return Ok(None);
    }

    let product = get_product_by_id(&txn, item.product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", item.product_id))?;
    let stored = VariantSelection::from_json(item.selected_variants.as_ref())?;
    let selection = resolve_selection(&txn, product.id, stored.variants().to_vec()).await?;
    let quote = quote_line(&txn, &product, &selection).await?;
    let unit = purchasable_unit(&txn, product.id, &selection, &quote).await?;
    let available = get_available_stock(&txn, unit).await?;
    if quantity > available {
        return Err(Error::InsufficientStock {
            unit,
            requested: quantity,
            available,
        });
    }

    let product_id = item.product_id;
    let item = write_line(
        &txn,
        cart_id,
        product_id,
        &selection,
        quantity,
        quote.unit_price,
        Some(item),
    )
    .await?;
    recompute_totals(&txn, cart_id).await?;
    txn.commit().await?;
    Ok(Some(item))
}

/// Removes one line from the owner's cart and returns the updated cart.
///
/// # Errors
/// Returns `NotFound` if the line does not belong to the owner's cart.
#[instrument(skip(db))]
pub async fn remove_item(db: &DatabaseConnection, owner: &OwnerRef, item_id: i64) -> Result<cart::Model> {
    let txn = db.begin().await?;
    let item = owned_item(&txn, owner, item_id).await?;
    CartItem::delete_by_id(item.id).exec(&txn).await?;
    let cart = recompute_totals(&txn, item.cart_id).await?;
    txn.commit().await?;
    Ok(cart)
}

/// Deletes every line of a cart and zeroes its totals.
pub(crate) async fn clear_cart_items<C>(db: &C, cart_id: i64) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .exec(db)
        .await?;
    recompute_totals(db, cart_id).await
}

/// Empties the owner's cart. Owners without a cart are left untouched.
#[instrument(skip(db))]
pub async fn clear_cart(db: &DatabaseConnection, owner: &OwnerRef) -> Result<()> {
    let txn = db.begin().await?;
    if let Some(cart) = find_cart(&txn, owner).await? {
        clear_cart_items(&txn, cart.id).await?;
    }
    txn.commit().await?;
    Ok(())
}

/// One cart line as shown to the buyer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineView {
    /// Cart line id
    pub item_id: i64,
    /// Product on the line
    pub product_id: i64,
    /// Product name, when the product still exists
    pub product_name: Option<String>,
    /// Selected variants in canonical order
    pub selected_variants: Vec<SelectedVariant>,
    /// Matched combination
    pub combination_id: Option<i64>,
    /// Quantity in the cart
    pub quantity: i32,
    /// Current unit price
    pub unit_price: f64,
    /// `unit_price × quantity`
    pub total_price: f64,
    /// Stock hint, when the line maps to a known unit
    pub available: Option<i32>,
}

/// Priced view of a cart with availability problems flagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CartSummary {
    /// Cart id; `None` when the owner has no cart yet
    pub cart_id: Option<i64>,
    /// All lines, repriced from current catalog data
    pub items: Vec<CartLineView>,
    /// Lines that cannot be bought at all
    pub unavailable_items: Vec<LineIssue>,
    /// Lines asking for more than the (cached) stock
    pub stock_issues: Vec<LineIssue>,
    /// Units across purchasable lines
    pub total_items: i32,
    /// Sum of purchasable line totals
    pub subtotal: f64,
    /// Amount due; equals `subtotal`
    pub total: f64,
}

/// Builds the owner's cart summary. Stock figures come from the cached hint.
#[instrument(skip(db, cache))]
pub async fn get_cart_summary(
    db: &DatabaseConnection,
    cache: &dyn CachePort,
    owner: &OwnerRef,
    stock_ttl: Duration,
) -> Result<CartSummary> {
    let Some(cart) = find_cart(db, owner).await? else {
        return Ok(CartSummary::default());
    };

    let mut summary = CartSummary {
        cart_id: Some(cart.id),
        ..CartSummary::default()
    };
    let mut subtotal = 0.0;

    for item in list_cart_items(db, cart.id).await? {
        match evaluate_line(db, item.clone()).await? {
            LineCheck::Priced(line) => {
                let available = available_hint(cache, db, line.unit, stock_ttl).await?;
                if line.item.quantity > available {
                    summary.stock_issues.push(LineIssue::InsufficientStock {
                        item_id: line.item.id,
                        unit: line.unit,
                        requested: line.item.quantity,
                        available,
                    });
                }
                let total_price = line.total_price();
                subtotal += total_price;
                summary.total_items += line.item.quantity;
                summary.items.push(CartLineView {
                    item_id: line.item.id,
                    product_id: line.product.id,
                    product_name: Some(line.product.name.clone()),
                    selected_variants: line.selection.variants().to_vec(),
                    combination_id: line.combination_id,
                    quantity: line.item.quantity,
                    unit_price: line.unit_price,
                    total_price,
                    available: Some(available),
                });
            }
            LineCheck::Unavailable(issue) => {
                let product_name = get_product_by_id(db, item.product_id)
                    .await?
                    .map(|product| product.name);
                let selected_variants = VariantSelection::from_json(item.selected_variants.as_ref())
                    .map(|selection| selection.variants().to_vec())
                    .unwrap_or_default();
                summary.items.push(CartLineView {
                    item_id: item.id,
                    product_id: item.product_id,
                    product_name,
                    selected_variants,
                    combination_id: None,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    available: None,
                });
                summary.unavailable_items.push(issue);
            }
        }
    }

    summary.subtotal = round_money(subtotal);
    summary.total = summary.subtotal;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::cache::MemoryCache;
    use crate::core::product::{set_product_status, set_vendor_status};
    use crate::models::{ProductStatus, VendorStatus};
    use crate::test_utils::*;

    const MAX: i32 = 9999;

    #[tokio::test]
    async fn test_same_line_accumulates() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(10).await?;
        let owner = OwnerRef::User(1);

        add_item(&db, &owner, CartLineInput::plain(product.id, 2), MAX).await?;
        let line = add_item(&db, &owner, CartLineInput::plain(product.id, 3), MAX).await?;
        assert_eq!(line.quantity, 5);
        assert_eq!(line.total_price, 50.0);

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 5);
        assert_eq!(cart.total_amount, 50.0);
        assert_eq!(list_cart_items(&db, cart.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_variant_order_does_not_split_lines() -> Result<()> {
        let (db, product, _combos, values) = setup_sized_colored_product(5).await?;
        let owner = OwnerRef::Session("guest-1".to_string());
        let (size, color) = (values[0].id, values[2].id);

        add_item(&db, &owner, CartLineInput::with_variants(product.id, &[color, size], 1), MAX)
            .await?;
        let line = add_item(
            &db,
            &owner,
            CartLineInput::with_variants(product.id, &[size, color], 1),
            MAX,
        )
        .await?;
        assert_eq!(line.quantity, 2);

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(list_cart_items(&db, cart.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_beyond_stock_leaves_cart_unchanged() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(3).await?;
        let owner = OwnerRef::User(2);

        add_item(&db, &owner, CartLineInput::plain(product.id, 2), MAX).await?;
        let err = add_item(&db, &owner, CartLineInput::plain(product.id, 2), MAX)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));

        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_validation() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(3).await?;
        let owner = OwnerRef::User(3);

        let zero = add_item(&db, &owner, CartLineInput::plain(product.id, 0), MAX).await;
        assert!(matches!(zero.unwrap_err(), Error::Validation { .. }));

        let too_many = add_item(&db, &owner, CartLineInput::plain(product.id, 3), 2).await;
        assert!(matches!(too_many.unwrap_err(), Error::Validation { .. }));

        let missing = add_item(&db, &owner, CartLineInput::plain(404, 1), MAX).await;
        assert!(matches!(missing.unwrap_err(), Error::NotFound { .. }));

        set_product_status(&db, product.id, ProductStatus::Inactive).await?;
        let inactive = add_item(&db, &owner, CartLineInput::plain(product.id, 1), MAX).await;
        assert!(matches!(inactive.unwrap_err(), Error::Conflict { .. }));

        let empty_session = add_item(
            &db,
            &OwnerRef::Session("  ".to_string()),
            CartLineInput::plain(product.id, 1),
            MAX,
        )
        .await;
        assert!(matches!(empty_session.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_rejects_selection_without_combination() -> Result<()> {
        let (db, product, _combos, values) = setup_sized_colored_product(5).await?;
        let owner = OwnerRef::User(7);

        // two sizes, no color
        let unmatched = add_item(
            &db,
            &owner,
            CartLineInput::with_variants(product.id, &[values[0].id, values[1].id], 3),
            MAX,
        )
        .await;
        assert!(matches!(unmatched.unwrap_err(), Error::NotFound { .. }));

        let bare = add_item(&db, &owner, CartLineInput::plain(product.id, 1), MAX).await;
        assert!(matches!(bare.unwrap_err(), Error::Validation { .. }));

        if let Some(cart) = find_cart(&db, &owner).await? {
            assert!(list_cart_items(&db, cart.id).await?.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_update_rejects_line_whose_combination_went_inactive() -> Result<()> {
        let (db, product, combos, values) = setup_sized_product(5).await?;
        let owner = OwnerRef::User(8);
        let line = add_item(
            &db,
            &owner,
            CartLineInput::with_variants(product.id, &[values[0].id], 1),
            MAX,
        )
        .await?;

        crate::core::catalog::update_combination(
            &db,
            combos[0].id,
            crate::core::catalog::CombinationUpdate {
                price_modifier: None,
                is_active: Some(false),
            },
        )
        .await?;
        let bumped = update_item_quantity(&db, &owner, line.id, 2, MAX).await;
        assert!(matches!(bumped.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_remove_and_clear() -> Result<()> {
        let (db, _vendor, product) = setup_with_product(10).await?;
        let second = create_test_product(&db, product.vendor_id, "Second", 4.0, 10).await?;
        let owner = OwnerRef::User(4);

        let first_line = add_item(&db, &owner, CartLineInput::plain(product.id, 1), MAX).await?;
        let second_line = add_item(&db, &owner, CartLineInput::plain(second.id, 1), MAX).await?;

        let updated = update_item_quantity(&db, &owner, first_line.id, 4, MAX).await?;
        assert_eq!(updated.unwrap().total_price, 40.0);

        let over = update_item_quantity(&db, &owner, first_line.id, 11, MAX).await;
        assert!(matches!(over.unwrap_err(), Error::InsufficientStock { .. }));

        let foreign = update_item_quantity(&db, &OwnerRef::User(99), first_line.id, 1, MAX).await;
        assert!(matches!(foreign.unwrap_err(), Error::NotFound { .. }));

        assert!(update_item_quantity(&db, &owner, first_line.id, 0, MAX).await?.is_none());
        let cart = remove_item(&db, &owner, second_line.id).await?;
        assert_eq!(cart.total_items, 0);

        add_item(&db, &owner, CartLineInput::plain(second.id, 2), MAX).await?;
        clear_cart(&db, &owner).await?;
        let cart = find_cart(&db, &owner).await?.unwrap();
        assert_eq!(cart.total_items, 0);
        assert_eq!(cart.total_amount, 0.0);
        assert!(list_cart_items(&db, cart.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_applies_price_law() -> Result<()> {
        let (db, product, _combos, values) = setup_priced_variant_product(5).await?;
        let owner = OwnerRef::User(5);
        let ids: Vec<i64> = values.iter().map(|value| value.id).collect();

        add_item(&db, &owner, CartLineInput::with_variants(product.id, &ids, 2), MAX).await?;
        let summary =
            get_cart_summary(&db, &MemoryCache::new(), &owner, Duration::from_secs(30)).await?;

        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].unit_price, 115.0);
        assert_eq!(summary.subtotal, 230.0);
        assert_eq!(summary.total, 230.0);
        assert!(summary.unavailable_items.is_empty());
        assert!(summary.stock_issues.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_flags_problems() -> Result<()> {
        let (db, vendor, product) = setup_with_product(5).await?;
        let other_vendor = create_test_vendor(&db, "Paused").await?;
        let paused = create_test_product(&db, other_vendor.id, "Paused Item", 3.0, 5).await?;
        let owner = OwnerRef::User(6);

        add_item(&db, &owner, CartLineInput::plain(product.id, 4), MAX).await?;
        add_item(&db, &owner, CartLineInput::plain(paused.id, 1), MAX).await?;
        set_vendor_status(&db, other_vendor.id, VendorStatus::Suspended).await?;
        crate::core::stock::decrease_stock(&db, StockUnit::Product(product.id), 3).await?;

        let summary =
            get_cart_summary(&db, &MemoryCache::new(), &owner, Duration::from_secs(30)).await?;
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.unavailable_items.len(), 1);
        assert!(matches!(
            summary.stock_issues[0],
            LineIssue::InsufficientStock {
                requested: 4,
                available: 2,
                ..
            }
        ));
        assert_eq!(summary.subtotal, 40.0);
        assert_eq!(vendor.status, "approved");
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_without_cart_is_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let summary = get_cart_summary(
            &db,
            &MemoryCache::new(),
            &OwnerRef::Session("nobody".to_string()),
            Duration::from_secs(30),
        )
        .await?;
        assert_eq!(summary, CartSummary::default());
        Ok(())
    }
}
