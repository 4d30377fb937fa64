use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainResult, Entity, Money, OrderId, ProductId, ValueObject};
use orderdesk_parties::Customer;
use orderdesk_products::Product;

/// Order line: product, unit price captured at placement, quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    /// Unit price at the time the order was placed. Later catalog price
    /// changes never alter it.
    pub price: Money,
    pub quantity: u32,
}

impl ValueObject for OrderLineItem {}

impl OrderLineItem {
    /// Freeze the product's current price into a line of `quantity` units.
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id_typed(),
            price: product.price(),
            quantity,
        }
    }

    pub fn subtotal(&self) -> DomainResult<Money> {
        self.price.times(self.quantity)
    }
}

/// Order as handed to the order store; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: Customer,
    pub line_items: Vec<OrderLineItem>,
}

/// A placed order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer: Customer,
    line_items: Vec<OrderLineItem>,
    created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, order: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            customer: order.customer,
            line_items: order.line_items,
            created_at,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn line_items(&self) -> &[OrderLineItem] {
        &self.line_items
    }

    pub fn line_item(&self, product_id: ProductId) -> Option<&OrderLineItem> {
        self.line_items.iter().find(|l| l.product_id == product_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Sum of all line subtotals.
    pub fn total(&self) -> DomainResult<Money> {
        self.line_items
            .iter()
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.subtotal()?))
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
