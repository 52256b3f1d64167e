/// Injected stock-hint cache port and its in-process implementations
pub mod cache;

/// Server carts: lines, pricing, totals and the cart summary
pub mod cart;

/// Variant types, per-product values and combination generation
pub mod catalog;

/// Cart to order conversion with all-or-nothing stock reservation
pub mod checkout;

/// Reconciling client-held carts into server carts
pub mod merge;

/// Vendor and product read model
pub mod product;

/// Authoritative stock ledger per product or combination
pub mod stock;

/// Vendor restock intake
pub mod supply;
