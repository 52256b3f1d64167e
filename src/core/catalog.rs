//! Variant catalog - Variant types, per-product variant values and combinations.
//!
//! The central operation is [`generate_combinations`], which takes the values a
//! product offers on each variant axis, forms their cartesian product and persists
//! one combination per tuple together with its junction links. The whole batch is
//! written inside one transaction, so a failure part way leaves nothing behind.
//!
//! Lookups are plain functions generic over [`ConnectionTrait`] so they run equally
//! on a pooled connection or inside a caller's transaction.

use crate::{
    config::settings::VariantTypeConfig,
    entities::{
        CombinationVariant, Product, VariantCombination, VariantType, VariantValue,
        combination_variant, variant_combination, variant_type, variant_value,
    },
    errors::{Error, Result},
    models::{SelectedVariant, VariantSelection, variant_key},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// One value offered on a variant axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantValueInput {
    /// The value label (e.g., "Large")
    pub value: String,
    /// Surcharge when this value is selected
    pub additional_price: f64,
}

impl VariantValueInput {
    /// Value with a surcharge.
    pub fn new(value: impl Into<String>, additional_price: f64) -> Self {
        Self {
            value: value.into(),
            additional_price,
        }
    }
}

/// All values a product offers on one variant axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantGroup {
    /// Variant type (axis) id
    pub variant_type_id: i64,
    /// Offered values, at least one
    pub values: Vec<VariantValueInput>,
}

/// Editable combination attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinationUpdate {
    /// New price modifier
    pub price_modifier: Option<f64>,
    /// New activity flag
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Variant types
// ---------------------------------------------------------------------------

/// Creates a variant type. The name is trimmed and lowercased.
///
/// # Errors
/// - `Validation` if the name or display name is empty
/// - `Conflict` if a type with the same name exists
#[instrument(skip(db))]
pub async fn create_variant_type(
    db: &DatabaseConnection,
    name: &str,
    display_name: &str,
    sort_order: i32,
) -> Result<variant_type::Model> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::validation("Variant type name cannot be empty"));
    }
    if display_name.trim().is_empty() {
        return Err(Error::validation("Variant type display name cannot be empty"));
    }
    if get_variant_type_by_name(db, &name).await?.is_some() {
        return Err(Error::conflict(format!("Variant type '{name}' already exists")));
    }

    let model = variant_type::ActiveModel {
        name: Set(name),
        display_name: Set(display_name.trim().to_string()),
        sort_order: Set(sort_order),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Finds a variant type by its (case-insensitive) name.
pub async fn get_variant_type_by_name<C>(db: &C, name: &str) -> Result<Option<variant_type::Model>>
where
    C: ConnectionTrait,
{
    VariantType::find()
        .filter(variant_type::Column::Name.eq(name.trim().to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists variant types ordered by `sort_order`, then name.
pub async fn list_variant_types(db: &DatabaseConnection) -> Result<Vec<variant_type::Model>> {
    VariantType::find()
        .order_by_asc(variant_type::Column::SortOrder)
        .order_by_asc(variant_type::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes a variant type that no product uses yet.
///
/// # Errors
/// - `NotFound` if the type does not exist
/// - `Conflict` if variant values reference it
#[instrument(skip(db))]
pub async fn delete_variant_type(db: &DatabaseConnection, variant_type_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let variant_type = VariantType::find_by_id(variant_type_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("variant type", variant_type_id))?;

    let in_use = VariantValue::find()
        .filter(variant_value::Column::VariantTypeId.eq(variant_type_id))
        .count(&txn)
        .await?;
    if in_use > 0 {
        return Err(Error::conflict(format!(
            "Variant type '{}' is referenced by {in_use} value(s)",
            variant_type.name
        )));
    }

    VariantType::delete_by_id(variant_type_id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

/// Creates the configured variant types that do not exist yet. Returns how many were created.
pub async fn seed_variant_types(
    db: &DatabaseConnection,
    configs: &[VariantTypeConfig],
) -> Result<usize> {
    let mut created = 0;
    for config in configs {
        if get_variant_type_by_name(db, &config.name).await?.is_some() {
            debug!(name = %config.name, "Variant type already present, skipping");
            continue;
        }
        create_variant_type(db, &config.name, &config.display_name, config.sort_order).await?;
        created += 1;
    }
    info!(created, "Variant types seeded");
    Ok(created)
}

// ---------------------------------------------------------------------------
// Variant values
// ---------------------------------------------------------------------------

fn validate_surcharge(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::validation(format!(
            "Additional price must be a non-negative number, got {amount}"
        )));
    }
    Ok(())
}

/// Finds the product's value on an axis, creating it if absent. An existing
/// value takes the supplied surcharge.
async fn upsert_variant_value<C>(
    db: &C,
    product_id: i64,
    variant_type: &variant_type::Model,
    input: &VariantValueInput,
) -> Result<variant_value::Model>
where
    C: ConnectionTrait,
{
    let label = input.value.trim();
    let existing = VariantValue::find()
        .filter(variant_value::Column::ProductId.eq(product_id))
        .filter(variant_value::Column::VariantTypeId.eq(variant_type.id))
        .filter(variant_value::Column::Value.eq(label))
        .one(db)
        .await?;

    match existing {
        Some(value) if (value.additional_price - input.additional_price).abs() < f64::EPSILON => {
            Ok(value)
        }
        Some(value) => {
            let mut active: variant_value::ActiveModel = value.into();
            active.additional_price = Set(input.additional_price);
            active.update(db).await.map_err(Into::into)
        }
        None => {
            let value = variant_value::ActiveModel {
                product_id: Set(product_id),
                variant_type_id: Set(Some(variant_type.id)),
                name: Set(variant_type.display_name.clone()),
                value: Set(label.to_string()),
                additional_price: Set(input.additional_price),
                stock: Set(None),
                ..Default::default()
            };
            value.insert(db).await.map_err(Into::into)
        }
    }
}

/// Adds (or re-prices) one value a product offers on a variant axis.
///
/// # Errors
/// Returns `NotFound` for an unknown product or variant type and `Validation` for
/// an empty value or invalid surcharge.
pub async fn add_variant_value(
    db: &DatabaseConnection,
    product_id: i64,
    variant_type_id: i64,
    input: VariantValueInput,
) -> Result<variant_value::Model> {
    if input.value.trim().is_empty() {
        return Err(Error::validation("Variant value cannot be empty"));
    }
    validate_surcharge(input.additional_price)?;
    if Product::find_by_id(product_id).one(db).await?.is_none() {
        return Err(Error::not_found("product", product_id));
    }
    let variant_type = VariantType::find_by_id(variant_type_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("variant type", variant_type_id))?;
    upsert_variant_value(db, product_id, &variant_type, &input).await
}

/// Lists all variant values of a product ordered by id.
pub async fn list_variant_values<C>(db: &C, product_id: i64) -> Result<Vec<variant_value::Model>>
where
    C: ConnectionTrait,
{
    VariantValue::find()
        .filter(variant_value::Column::ProductId.eq(product_id))
        .order_by_asc(variant_value::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Normalizes a client selection and replaces labels and surcharges with catalog data.
///
/// # Errors
/// - `Validation`/`Conflict` for malformed sets (see [`VariantSelection::normalize`])
/// - `NotFound` if an id is unknown or belongs to another product
pub async fn resolve_selection<C>(
    db: &C,
    product_id: i64,
    variants: Vec<SelectedVariant>,
) -> Result<VariantSelection>
where
    C: ConnectionTrait,
{
    let normalized = VariantSelection::normalize(variants)?;
    if normalized.is_empty() {
        return Ok(normalized);
    }

    let ids = normalized.ids();
    let rows: HashMap<i64, variant_value::Model> = VariantValue::find()
        .filter(variant_value::Column::ProductId.eq(product_id))
        .filter(variant_value::Column::Id.is_in(ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|row| (row.id, row))
        .collect();

    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let row = rows
            .get(&id)
            .ok_or_else(|| Error::not_found("variant value", format!("{id} for product {product_id}")))?;
        resolved.push(SelectedVariant {
            id,
            name: row.name.clone(),
            value: row.value.clone(),
            additional_price: row.additional_price,
        });
    }
    Ok(VariantSelection::from_sorted(resolved))
}

// ---------------------------------------------------------------------------
// Combinations
// ---------------------------------------------------------------------------

/// Cartesian product of the given factors, preserving factor order within each tuple.
pub(crate) fn cartesian_product<T: Clone>(factors: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut tuples: Vec<Vec<T>> = vec![Vec::new()];
    for factor in factors {
        tuples = tuples
            .iter()
            .flat_map(|prefix| {
                factor.iter().map(move |item| {
                    let mut tuple = prefix.clone();
                    tuple.push(item.clone());
                    tuple
                })
            })
            .collect();
    }
    tuples
}

/// Short uppercase code for a value: its first three ASCII alphanumerics.
fn value_code(value: &variant_value::Model) -> String {
    let code: String = value
        .value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(3)
        .collect::<String>()
        .to_uppercase();
    if code.is_empty() {
        format!("V{}", value.id)
    } else {
        code
    }
}

/// Generates and persists every combination of the given variant groups.
///
/// Groups are ordered by their type's `sort_order`; a product with `n` axes of
/// `m₁…mₙ` values gets `Π mᵢ` combinations, each starting with `default_stock`
/// units, a zero price modifier and the active flag set.
///
/// # Errors
/// - `NotFound` for an unknown product or variant type
/// - `Validation` for an empty group, a repeated type, a repeated value or bad numbers
/// - `Conflict` if a variant set already exists for the product or two tuples
///   derive the same SKU suffix
///
/// Nothing is written when an error is returned.
#[instrument(skip(db, groups), fields(groups = groups.len()))]
pub async fn generate_combinations(
    db: &DatabaseConnection,
    product_id: i64,
    groups: Vec<VariantGroup>,
    default_stock: i32,
) -> Result<Vec<variant_combination::Model>> {
    if default_stock < 0 {
        return Err(Error::validation("Default stock cannot be negative"));
    }
    if groups.is_empty() {
        debug!(product_id, "No variant groups supplied, product keeps bare stock");
        return Ok(Vec::new());
    }

    let txn = db.begin().await?;

    if Product::find_by_id(product_id).one(&txn).await?.is_none() {
        return Err(Error::not_found("product", product_id));
    }

    // Validate every group before writing anything.
    let mut seen_types = HashSet::new();
    let mut typed_groups = Vec::with_capacity(groups.len());
    for group in groups {
        if !seen_types.insert(group.variant_type_id) {
            return Err(Error::validation(format!(
                "Variant type {} appears more than once",
                group.variant_type_id
            )));
        }
        let variant_type = VariantType::find_by_id(group.variant_type_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found("variant type", group.variant_type_id))?;
        if group.values.is_empty() {
            return Err(Error::validation(format!(
                "Variant type '{}' has no values",
                variant_type.name
            )));
        }
        let mut seen_values = HashSet::new();
        for input in &group.values {
            let label = input.value.trim().to_lowercase();
            if label.is_empty() {
                return Err(Error::validation("Variant value cannot be empty"));
            }
            if !seen_values.insert(label) {
                return Err(Error::validation(format!(
                    "Value '{}' repeated for variant type '{}'",
                    input.value.trim(),
                    variant_type.name
                )));
            }
            validate_surcharge(input.additional_price)?;
        }
        typed_groups.push((variant_type, group.values));
    }
    typed_groups.sort_by_key(|(variant_type, _)| (variant_type.sort_order, variant_type.id));

    let mut factors = Vec::with_capacity(typed_groups.len());
    for (variant_type, inputs) in &typed_groups {
        let mut values = Vec::with_capacity(inputs.len());
        for input in inputs {
            values.push(upsert_variant_value(&txn, product_id, variant_type, input).await?);
        }
        factors.push(values);
    }

    let existing = list_combinations(&txn, product_id).await?;
    let mut taken_keys: HashSet<String> = existing
        .iter()
        .map(|combination| combination.variant_key.clone())
        .collect();
    let mut taken_skus: HashSet<String> = existing
        .into_iter()
        .map(|combination| combination.sku_suffix)
        .collect();

    let now = chrono::Utc::now();
    let mut created = Vec::new();
    for tuple in cartesian_product(&factors) {
        let ids: Vec<i64> = tuple.iter().map(|value| value.id).collect();
        let key = variant_key(&ids);
        let combination_name = tuple
            .iter()
            .map(|value| value.value.as_str())
            .collect::<Vec<_>>()
            .join("-");
        if !taken_keys.insert(key.clone()) {
            return Err(Error::conflict(format!(
                "Combination '{combination_name}' already exists for product {product_id}"
            )));
        }
        let sku_suffix = tuple.iter().map(value_code).collect::<Vec<_>>().join("-");
        if !taken_skus.insert(sku_suffix.clone()) {
            return Err(Error::conflict(format!(
                "Duplicate SKU suffix '{sku_suffix}' for combination '{combination_name}'"
            )));
        }

        let combination = variant_combination::ActiveModel {
            product_id: Set(product_id),
            combination_name: Set(combination_name),
            sku_suffix: Set(sku_suffix),
            variant_key: Set(key),
            stock: Set(default_stock),
            price_modifier: Set(0.0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let links = ids.iter().map(|&variant_value_id| combination_variant::ActiveModel {
            combination_id: Set(combination.id),
            variant_value_id: Set(variant_value_id),
        });
        CombinationVariant::insert_many(links)
            .exec_without_returning(&txn)
            .await?;

        created.push(combination);
    }

    txn.commit().await?;
    info!(
        product_id,
        combinations = created.len(),
        "Variant combinations generated"
    );
    Ok(created)
}

/// Retrieves a combination by id.
pub async fn get_combination_by_id<C>(
    db: &C,
    combination_id: i64,
) -> Result<Option<variant_combination::Model>>
where
    C: ConnectionTrait,
{
    VariantCombination::find_by_id(combination_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a product's combinations ordered by id.
pub async fn list_combinations<C>(
    db: &C,
    product_id: i64,
) -> Result<Vec<variant_combination::Model>>
where
    C: ConnectionTrait,
{
    VariantCombination::find()
        .filter(variant_combination::Column::ProductId.eq(product_id))
        .order_by_asc(variant_combination::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Whether the product is sold through variant combinations.
pub async fn product_has_combinations<C>(db: &C, product_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = VariantCombination::find()
        .filter(variant_combination::Column::ProductId.eq(product_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Variant value ids linked to a combination, ascending, read from the junction table.
pub async fn combination_variant_ids<C>(db: &C, combination_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let links = CombinationVariant::find()
        .filter(combination_variant::Column::CombinationId.eq(combination_id))
        .order_by_asc(combination_variant::Column::VariantValueId)
        .all(db)
        .await?;
    Ok(links.into_iter().map(|link| link.variant_value_id).collect())
}

/// Finds the combination whose variant set equals `sorted_ids` exactly.
///
/// Subsets and supersets never match. An empty set has no combination.
pub async fn find_combination_by_variant_set<C>(
    db: &C,
    product_id: i64,
    sorted_ids: &[i64],
) -> Result<Option<variant_combination::Model>>
where
    C: ConnectionTrait,
{
    if sorted_ids.is_empty() {
        return Ok(None);
    }
    let key = variant_key(sorted_ids);
    let Some(combination) = VariantCombination::find()
        .filter(variant_combination::Column::ProductId.eq(product_id))
        .filter(variant_combination::Column::VariantKey.eq(key.as_str()))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let linked = combination_variant_ids(db, combination.id).await?;
    if variant_key(&linked) != key {
        warn!(
            combination_id = combination.id,
            %key,
            "Combination key disagrees with its junction links"
        );
        return Ok(None);
    }
    Ok(Some(combination))
}

/// Updates a combination's price modifier and/or activity flag.
///
/// # Errors
/// Returns `NotFound` for an unknown combination and `Validation` for a
/// non-finite modifier.
#[instrument(skip(db))]
pub async fn update_combination(
    db: &DatabaseConnection,
    combination_id: i64,
    update: CombinationUpdate,
) -> Result<variant_combination::Model> {
    if update.price_modifier.is_some_and(|modifier| !modifier.is_finite()) {
        return Err(Error::validation("Price modifier must be a finite number"));
    }

    let mut combination: variant_combination::ActiveModel =
        get_combination_by_id(db, combination_id)
            .await?
            .ok_or_else(|| Error::not_found("combination", combination_id))?
            .into();
    if let Some(modifier) = update.price_modifier {
        combination.price_modifier = Set(modifier);
    }
    if let Some(active) = update.is_active {
        combination.is_active = Set(active);
    }
    combination.updated_at = Set(chrono::Utc::now());
    combination.update(db).await.map_err(Into::into)
}
