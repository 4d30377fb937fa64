//! Sales orders: order model, store boundaries and the order placement workflow.
//!
//! The placement workflow validates the customer and requested products,
//! snapshots prices, decrements stock and records the order. Stores are
//! injected as trait implementations; this crate contains no storage.

pub mod config;
pub mod context;
pub mod order;
pub mod placement;
pub mod request;
pub mod store;

pub use config::{MissingProductPolicy, PlacementSettings};
pub use context::CallContext;
pub use order::{NewOrder, Order, OrderLineItem};
pub use placement::{OrderPlacementService, PlaceOrderError};
pub use request::{OrderRequest, RequestedProduct, RequestedQuantities};
pub use store::{CustomerStore, OrderStore, ProductStore, StoreError, Transaction, UnitOfWork};
