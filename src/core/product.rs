//! Product and vendor records - The catalog data the engine reads.
//!
//! Products and vendors are owned by the catalog and vendor registry services; this
//! module holds the local read model the inventory engine consults (price,
//! discounted price, status, owning vendor, vendor approval) together with the
//! few write helpers needed to seed and maintain it.

use crate::{
    entities::{Product, Vendor, product, vendor},
    errors::{Error, Result},
    models::{ProductStatus, VendorStatus},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Fields needed to register a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Owning vendor
    pub vendor_id: i64,
    /// Product name
    pub name: String,
    /// Base price
    pub price: f64,
    /// Optional sale price
    pub discounted_price: Option<f64>,
    /// Bare-product stock
    pub stock: i32,
}

fn validate_price(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::validation(format!(
            "Price must be a non-negative number, got {amount}"
        )));
    }
    Ok(())
}

/// Registers a vendor with the given approval status.
///
/// # Errors
/// Returns an error if the name is empty or the insert fails.
#[instrument(skip(db))]
pub async fn create_vendor(
    db: &DatabaseConnection,
    name: &str,
    status: VendorStatus,
) -> Result<vendor::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("Vendor name cannot be empty"));
    }

    let vendor = vendor::ActiveModel {
        name: Set(name.trim().to_string()),
        status: Set(status.as_str().to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let vendor = vendor.insert(db).await?;
    info!(vendor_id = vendor.id, status = status.as_str(), "Vendor registered");
    Ok(vendor)
}

/// Retrieves a vendor by id.
pub async fn get_vendor_by_id<C>(db: &C, vendor_id: i64) -> Result<Option<vendor::Model>>
where
    C: ConnectionTrait,
{
    Vendor::find_by_id(vendor_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Changes a vendor's approval status.
///
/// # Errors
/// Returns `NotFound` if the vendor does not exist.
#[instrument(skip(db))]
pub async fn set_vendor_status(
    db: &DatabaseConnection,
    vendor_id: i64,
    status: VendorStatus,
) -> Result<vendor::Model> {
    let mut vendor: vendor::ActiveModel = get_vendor_by_id(db, vendor_id)
        .await?
        .ok_or_else(|| Error::not_found("vendor", vendor_id))?
        .into();
    vendor.status = Set(status.as_str().to_string());
    vendor.update(db).await.map_err(Into::into)
}

/// Creates a new active product, performing input validation.
///
/// # Errors
/// Returns an error if:
/// - The product name is empty or whitespace-only
/// - A price is negative or not finite, or the discounted price exceeds the base price
/// - The stock is negative
/// - The vendor does not exist
pub async fn create_product(db: &DatabaseConnection, new: NewProduct) -> Result<product::Model> {
    if new.name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    validate_price(new.price)?;
    if let Some(discounted) = new.discounted_price {
        validate_price(discounted)?;
        if discounted > new.price {
            return Err(Error::validation(
                "Discounted price cannot exceed the base price",
            ));
        }
    }
    if new.stock < 0 {
        return Err(Error::validation("Stock cannot be negative"));
    }
    if get_vendor_by_id(db, new.vendor_id).await?.is_none() {
        return Err(Error::not_found("vendor", new.vendor_id));
    }

    let now = chrono::Utc::now();
    let product = product::ActiveModel {
        vendor_id: Set(new.vendor_id),
        name: Set(new.name.trim().to_string()),
        price: Set(new.price),
        discounted_price: Set(new.discounted_price),
        status: Set(ProductStatus::Active.as_str().to_string()),
        stock: Set(new.stock),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a vendor's products ordered by name.
pub async fn list_vendor_products(
    db: &DatabaseConnection,
    vendor_id: i64,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::VendorId.eq(vendor_id))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Changes a product's publication status.
///
/// # Errors
/// Returns `NotFound` if the product does not exist.
#[instrument(skip(db))]
pub async fn set_product_status(
    db: &DatabaseConnection,
    product_id: i64,
    status: ProductStatus,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?
        .into();
    product.status = Set(status.as_str().to_string());
    product.updated_at = Set(chrono::Utc::now());
    product.update(db).await.map_err(Into::into)
}

/// Updates a product's base and discounted price.
///
/// # Errors
/// Returns an error if a price is invalid or the product does not exist.
pub async fn update_product_pricing(
    db: &DatabaseConnection,
    product_id: i64,
    price: f64,
    discounted_price: Option<f64>,
) -> Result<product::Model> {
    validate_price(price)?;
    if let Some(discounted) = discounted_price {
        validate_price(discounted)?;
        if discounted > price {
            return Err(Error::validation("Discounted price cannot exceed the base price"));
        }
    }

    let mut product: product::ActiveModel = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?
        .into();
    product.price = Set(price);
    product.discounted_price = Set(discounted_price);
    product.updated_at = Set(chrono::Utc::now());
    product.update(db).await.map_err(Into::into)
}
