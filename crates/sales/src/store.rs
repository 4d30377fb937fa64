//! Store boundaries used by order placement.
//!
//! The workflow never talks to storage directly. It reaches customers, products
//! and orders through these traits, and groups its writes into one
//! [`UnitOfWork`] so that a stock decrement is never committed without the
//! order that caused it.
//!
//! ## Write semantics
//!
//! - Reads (`find_by_id`, `find_all_by_id`) happen outside the transaction.
//! - `update_quantity` and `create` take the same transaction handle (`Tx`).
//! - Nothing written through `Tx` is visible until [`Transaction::commit`];
//!   dropping or rolling back the handle discards every staged write.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use orderdesk_core::{CustomerId, ProductId};
use orderdesk_parties::Customer;
use orderdesk_products::{Product, StockAdjustment};

use crate::order::{NewOrder, Order};

/// Store operation error.
///
/// These are **infrastructure errors** surfaced by store implementations, as
/// opposed to domain errors (validation, invariants). Order placement passes
/// them to its caller unchanged, except for `InsufficientStock` which it
/// reports as a business failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, timeout, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stock decrement asked for more units than are available.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A concurrent write invalidated this one (serialization failure, stale row).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Any other backend failure.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Transaction handle spanning the placement writes.
#[async_trait]
pub trait Transaction: Send + Sized {
    /// Make every staged write visible, atomically.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard every staged write.
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Factory for transaction handles.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Returns `None` when no customer has this id.
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
}

#[async_trait]
pub trait ProductStore<Tx: Send>: Send + Sync {
    /// Returns the subset of `ids` that exist. Order is not significant.
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Decrement stock for each adjustment, inside `tx`.
    ///
    /// Implementations must:
    /// - ignore adjustments for unknown product ids
    /// - fail with [`StoreError::InsufficientStock`] when any known product would
    ///   go below zero, applying none of the adjustments
    async fn update_quantity(
        &self,
        tx: &mut Tx,
        adjustments: &[StockAdjustment],
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore<Tx: Send>: Send + Sync {
    /// Record a new order with all of its line items, inside `tx`.
    async fn create(&self, tx: &mut Tx, order: NewOrder) -> Result<Order, StoreError>;
}

#[async_trait]
impl<S> UnitOfWork for Arc<S>
where
    S: UnitOfWork + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}

#[async_trait]
impl<S> CustomerStore for Arc<S>
where
    S: CustomerStore + ?Sized,
{
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).find_by_id(id).await
    }
}

#[async_trait]
impl<Tx, S> ProductStore<Tx> for Arc<S>
where
    Tx: Send,
    S: ProductStore<Tx> + ?Sized,
{
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        (**self).find_all_by_id(ids).await
    }

    async fn update_quantity(
        &self,
        tx: &mut Tx,
        adjustments: &[StockAdjustment],
    ) -> Result<(), StoreError> {
        (**self).update_quantity(tx, adjustments).await
    }
}

#[async_trait]
impl<Tx, S> OrderStore<Tx> for Arc<S>
where
    Tx: Send,
    S: OrderStore<Tx> + ?Sized,
{
    async fn create(&self, tx: &mut Tx, order: NewOrder) -> Result<Order, StoreError> {
        (**self).create(tx, order).await
    }
}
