//! Cart entity - The server-side cart aggregate of one user or one guest session.
//!
//! Exactly one of `user_id` and `session_id` is set. Totals are recomputed from
//! the cart items after every mutation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    /// Unique identifier for the cart
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user for authenticated carts
    pub user_id: Option<i64>,
    /// Owning session for guest carts
    pub session_id: Option<String>,
    /// Sum of line quantities
    pub total_items: i32,
    /// Sum of line totals
    pub total_amount: f64,
    /// When the cart was created
    pub created_at: DateTimeUtc,
    /// When the cart was last modified
    pub updated_at: DateTimeUtc,
}

/// `Cart` relationships are declared from the item side
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
