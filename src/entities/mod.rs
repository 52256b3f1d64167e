//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cart;
pub mod cart_item;
pub mod combination_variant;
pub mod order;
pub mod order_item;
pub mod product;
pub mod supply_record;
pub mod variant_combination;
pub mod variant_type;
pub mod variant_value;
pub mod vendor;

// Re-export specific types to avoid conflicts
pub use cart::{Column as CartColumn, Entity as Cart, Model as CartModel};
pub use cart_item::{Column as CartItemColumn, Entity as CartItem, Model as CartItemModel};
pub use combination_variant::{
    Column as CombinationVariantColumn, Entity as CombinationVariant,
    Model as CombinationVariantModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use supply_record::{
    Column as SupplyRecordColumn, Entity as SupplyRecord, Model as SupplyRecordModel,
};
pub use variant_combination::{
    Column as VariantCombinationColumn, Entity as VariantCombination,
    Model as VariantCombinationModel,
};
pub use variant_type::{
    Column as VariantTypeColumn, Entity as VariantType, Model as VariantTypeModel,
};
pub use variant_value::{
    Column as VariantValueColumn, Entity as VariantValue, Model as VariantValueModel,
};
pub use vendor::{Column as VendorColumn, Entity as Vendor, Model as VendorModel};
