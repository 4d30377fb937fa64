//! In-memory customer, product and order stores sharing one transaction model.
//!
//! Intended for tests/dev. Not optimized for performance.
//!
//! A transaction holds the database lock from `begin` until commit or
//! rollback, so transactions are fully serialised. Writes are staged on the
//! handle and only reach the tables on commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use orderdesk_core::{CustomerId, Entity, Money, OrderId, ProductId};
use orderdesk_parties::Customer;
use orderdesk_products::{Product, StockAdjustment};
use orderdesk_sales::{
    CustomerStore, NewOrder, Order, OrderPlacementService, OrderStore, ProductStore, StoreError,
    Transaction, UnitOfWork,
};

/// Rows keyed by their entity id.
type Table<E> = HashMap<<E as Entity>::Id, E>;

/// Insert or replace `row` under its own id.
fn upsert<E: Entity>(table: &mut Table<E>, row: E) {
    table.insert(row.id().clone(), row);
}

#[derive(Debug, Default)]
struct Tables {
    customers: Table<Customer>,
    products: Table<Product>,
    orders: Vec<Order>,
}

/// Placement service wired entirely to one [`InMemoryDatabase`].
pub type InMemoryPlacementService =
    OrderPlacementService<InMemoryDatabase, InMemoryDatabase, InMemoryDatabase, InMemoryDatabase>;

/// Shared handle to an in-memory database. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placement_service(&self) -> InMemoryPlacementService {
        OrderPlacementService::new(self.clone(), self.clone(), self.clone(), self.clone())
    }

    pub async fn insert_customer(&self, customer: Customer) {
        let mut tables = self.tables.lock().await;
        upsert(&mut tables.customers, customer);
    }

    pub async fn insert_product(&self, product: Product) {
        let mut tables = self.tables.lock().await;
        upsert(&mut tables.products, product);
    }

    /// Change a product's catalog price. Returns `false` for unknown ids.
    pub async fn reprice(&self, product_id: ProductId, price: Money) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.products.get_mut(&product_id) {
            Some(product) => {
                product.reprice(price);
                true
            }
            None => false,
        }
    }

    pub async fn product(&self, product_id: ProductId) -> Option<Product> {
        self.tables.lock().await.products.get(&product_id).cloned()
    }

    /// Committed orders, in commit order.
    pub async fn orders(&self) -> Vec<Order> {
        self.tables.lock().await.orders.clone()
    }
}

/// Transaction over an [`InMemoryDatabase`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    staged_products: Table<Product>,
    staged_orders: Vec<Order>,
}

impl InMemoryTransaction {
    /// Product as this transaction sees it: staged copy first, then committed row.
    fn product(&self, product_id: ProductId) -> Option<&Product> {
        self.staged_products
            .get(&product_id)
            .or_else(|| self.tables.products.get(&product_id))
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut tables,
            staged_products,
            staged_orders,
        } = self;
        trace!(
            products = staged_products.len(),
            orders = staged_orders.len(),
            "committing in-memory transaction"
        );
        tables.products.extend(staged_products);
        tables.orders.extend(staged_orders);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        trace!("rolling back in-memory transaction");
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryDatabase {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        let tables = Arc::clone(&self.tables).lock_owned().await;
        Ok(InMemoryTransaction {
            tables,
            staged_products: HashMap::new(),
            staged_orders: Vec::new(),
        })
    }
}

#[async_trait]
impl CustomerStore for InMemoryDatabase {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.tables.lock().await.customers.get(&id).cloned())
    }
}

#[async_trait]
impl ProductStore<InMemoryTransaction> for InMemoryDatabase {
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id))
            .cloned()
            .collect())
    }

    async fn update_quantity(
        &self,
        tx: &mut InMemoryTransaction,
        adjustments: &[StockAdjustment],
    ) -> Result<(), StoreError> {
        // Apply to scratch copies first so a shortage leaves `tx` untouched.
        let mut pending: Table<Product> = HashMap::new();
        for adjustment in adjustments {
            let current = pending
                .get(&adjustment.product_id)
                .or_else(|| tx.product(adjustment.product_id))
                .cloned();
            let Some(mut product) = current else {
                trace!(product_id = %adjustment.product_id, "ignoring stock adjustment for unknown product");
                continue;
            };
            if product.take_stock(adjustment.quantity).is_err() {
                return Err(StoreError::InsufficientStock {
                    product_id: adjustment.product_id,
                    requested: adjustment.quantity,
                    available: product.quantity(),
                });
            }
            upsert(&mut pending, product);
        }

        tx.staged_products.extend(pending);
        Ok(())
    }
}

#[async_trait]
impl OrderStore<InMemoryTransaction> for InMemoryDatabase {
    async fn create(&self, tx: &mut InMemoryTransaction, order: NewOrder) -> Result<Order, StoreError> {
        if !tx.tables.customers.contains_key(&order.customer.id_typed()) {
            return Err(StoreError::Backend(format!(
                "order references unknown customer {}",
                order.customer.id_typed()
            )));
        }
        if order.line_items.is_empty() {
            return Err(StoreError::Backend("order has no line items".to_string()));
        }

        let order = Order::new(OrderId::new(), order, Utc::now());
        tx.staged_orders.push(order.clone());
        Ok(order)
    }
}
