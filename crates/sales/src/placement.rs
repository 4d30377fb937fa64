//! Order placement workflow.
//!
//! ```text
//! OrderRequest
//!   ↓
//! 1. Validate input (customer id is a UUID, quantities positive)
//!   ↓
//! 2. Resolve customer
//!   ↓
//! 3. Resolve products (one batch lookup), apply missing-product policy
//!   ↓
//! 4. Check stock for every found product
//!   ↓
//! 5. Unit of work: decrement stock → snapshot prices into line items → create order → commit
//!   ↓
//! Order
//! ```
//!
//! Steps 1–4 only read, so a failure there leaves nothing to undo. Step 5 runs
//! inside one transaction; any failure rolls it back, so stock is never left
//! decremented for an order that was not recorded.
//!
//! Placement is not idempotent: every successful call creates a new order and
//! decrements stock again.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use orderdesk_core::{CustomerId, DomainError, ProductId};
use orderdesk_parties::Customer;
use orderdesk_products::Product;

use crate::config::{MissingProductPolicy, PlacementSettings};
use crate::context::CallContext;
use crate::order::{NewOrder, Order, OrderLineItem};
use crate::request::{OrderRequest, RequestedQuantities};
use crate::store::{CustomerStore, OrderStore, ProductStore, StoreError, Transaction, UnitOfWork};

/// Why an order could not be placed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaceOrderError {
    /// Malformed customer id or requested quantity. Nothing was looked up.
    #[error("invalid input: {0}")]
    InvalidInput(DomainError),

    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    /// Every requested product is unknown, or some are and the policy is
    /// [`MissingProductPolicy::Reject`]. Carries the missing ids.
    #[error("products not found: {}", display_ids(.0))]
    ProductsNotFound(Vec<ProductId>),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("order placement cancelled")]
    Cancelled,

    #[error("deadline exceeded waiting on a store call")]
    DeadlineExceeded,

    /// Store failure, passed through unchanged.
    #[error(transparent)]
    Store(StoreError),
}

impl PlaceOrderError {
    /// Whether the same request may succeed if simply retried.
    ///
    /// Validation and not-found failures need different input; stock
    /// shortages need different stock.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlaceOrderError::DeadlineExceeded
                | PlaceOrderError::Store(StoreError::Unavailable(_))
                | PlaceOrderError::Store(StoreError::Conflict(_))
        )
    }
}

impl From<StoreError> for PlaceOrderError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => PlaceOrderError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => PlaceOrderError::Store(other),
        }
    }
}

fn display_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Places customer orders against injected stores.
///
/// `U` opens the transaction that `P::update_quantity` and `O::create` share.
#[derive(Debug, Clone)]
pub struct OrderPlacementService<U, C, P, O> {
    unit_of_work: U,
    customers: C,
    products: P,
    orders: O,
    settings: PlacementSettings,
}

impl<U, C, P, O> OrderPlacementService<U, C, P, O>
where
    U: UnitOfWork,
    C: CustomerStore,
    P: ProductStore<U::Tx>,
    O: OrderStore<U::Tx>,
{
    pub fn new(unit_of_work: U, customers: C, products: P, orders: O) -> Self {
        Self {
            unit_of_work,
            customers,
            products,
            orders,
            settings: PlacementSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PlacementSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PlacementSettings {
        &self.settings
    }

    /// Place an order for `request.customer_id` with `request.products`.
    #[tracing::instrument(
        name = "orders::place_order",
        skip_all,
        fields(customer_id = %request.customer_id, requested_lines = request.products.len())
    )]
    pub async fn place_order(
        &self,
        ctx: &CallContext,
        request: OrderRequest,
    ) -> Result<Order, PlaceOrderError> {
        let placed = self.place(ctx, request).await;
        match &placed {
            Ok(_) => {}
            Err(err @ PlaceOrderError::Store(_)) => {
                error!(error = %err, "order placement failed");
            }
            Err(err) => warn!(error = %err, "order rejected"),
        }
        placed
    }

    async fn place(
        &self,
        ctx: &CallContext,
        request: OrderRequest,
    ) -> Result<Order, PlaceOrderError> {
        let ctx = self.effective_context(ctx);

        let customer_id: CustomerId = request
            .customer_id
            .parse()
            .map_err(PlaceOrderError::InvalidInput)?;
        let requested = RequestedQuantities::from_request(&request.products)
            .map_err(PlaceOrderError::InvalidInput)?;
        debug!(products = requested.len(), "input validated");

        let customer = ctx
            .run(self.customers.find_by_id(customer_id))
            .await?
            .ok_or(PlaceOrderError::CustomerNotFound(customer_id))?;

        if requested.is_empty() {
            return Err(PlaceOrderError::ProductsNotFound(Vec::new()));
        }

        let found = ctx
            .run(self.products.find_all_by_id(requested.product_ids()))
            .await?;
        let found = self.resolve_products(&requested, found)?;

        for product in &found {
            let wanted = requested.quantity_of(product.id_typed()).unwrap_or(0);
            if !product.has_stock_for(wanted) {
                return Err(PlaceOrderError::InsufficientStock {
                    product_id: product.id_typed(),
                    requested: wanted,
                    available: product.quantity(),
                });
            }
        }

        let mut tx = ctx.run(self.unit_of_work.begin()).await?;
        let written = self
            .decrement_and_create(&ctx, &mut tx, customer, &requested, &found)
            .await;
        let order = match written {
            Ok(order) => order,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after placement error");
                }
                return Err(err);
            }
        };

        // Commit runs to completion once started; cancelling it would leave
        // the outcome unknown to the caller.
        tx.commit().await?;

        let line_items = order.line_items().len();
        match order.total() {
            Ok(total) => info!(order_id = %order.id_typed(), line_items, %total, "order placed"),
            Err(_) => info!(order_id = %order.id_typed(), line_items, "order placed (total overflows)"),
        }

        Ok(order)
    }

    fn effective_context(&self, ctx: &CallContext) -> CallContext {
        match (ctx.deadline(), self.settings.store_timeout()) {
            (None, Some(timeout)) => ctx.clone().with_timeout(timeout),
            _ => ctx.clone(),
        }
    }

    /// Keep found products in request order and apply the missing-product policy.
    fn resolve_products(
        &self,
        requested: &RequestedQuantities,
        found: Vec<Product>,
    ) -> Result<Vec<Product>, PlaceOrderError> {
        let mut by_id: HashMap<ProductId, Product> =
            found.into_iter().map(|p| (p.id_typed(), p)).collect();

        let mut resolved = Vec::with_capacity(by_id.len());
        let mut missing = Vec::new();
        for id in requested.product_ids() {
            match by_id.remove(id) {
                Some(product) => resolved.push(product),
                None => missing.push(*id),
            }
        }

        if resolved.is_empty() {
            return Err(PlaceOrderError::ProductsNotFound(missing));
        }

        if !missing.is_empty() {
            match self.settings.missing_products {
                MissingProductPolicy::Reject => {
                    return Err(PlaceOrderError::ProductsNotFound(missing));
                }
                MissingProductPolicy::Skip => {
                    warn!(missing = %display_ids(&missing), "placing order without unknown products");
                }
            }
        }

        Ok(resolved)
    }

    async fn decrement_and_create(
        &self,
        ctx: &CallContext,
        tx: &mut U::Tx,
        customer: Customer,
        requested: &RequestedQuantities,
        found: &[Product],
    ) -> Result<Order, PlaceOrderError> {
        // Decrement covers the whole request; stores ignore unknown ids.
        let adjustments = requested.adjustments();
        ctx.run(self.products.update_quantity(tx, &adjustments)).await?;
        debug!(adjustments = adjustments.len(), "stock decremented");

        let line_items = found
            .iter()
            .filter_map(|product| {
                requested
                    .quantity_of(product.id_typed())
                    .map(|quantity| OrderLineItem::snapshot(product, quantity))
            })
            .collect();

        ctx.run(self.orders.create(tx, NewOrder { customer, line_items }))
            .await
    }
}
