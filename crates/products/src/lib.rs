//! Products domain module (catalog price + available stock).
//!
//! Pure domain logic: no IO, no storage. Product stores own the records; the
//! order placement workflow only reads them and requests stock decrements.

pub mod product;

pub use product::{Product, StockAdjustment};
