use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult, Entity, Money, ProductId, ValueObject};

/// A sellable product: current unit price and available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    /// Current unit price. Orders snapshot this value at placement time.
    price: Money,
    /// Units available for sale.
    quantity: u32,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, quantity: u32) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            price,
            quantity,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn has_stock_for(&self, requested: u32) -> bool {
        requested <= self.quantity
    }

    pub fn reprice(&mut self, price: Money) {
        self.price = price;
    }

    /// Remove `requested` units from stock.
    ///
    /// Stock never goes negative: asking for more than is available leaves the
    /// product untouched and fails.
    pub fn take_stock(&mut self, requested: u32) -> DomainResult<()> {
        let remaining = self.quantity.checked_sub(requested).ok_or_else(|| {
            DomainError::invariant(format!(
                "insufficient stock for product {}: requested {requested}, available {}",
                self.id, self.quantity
            ))
        })?;
        self.quantity = remaining;
        Ok(())
    }

    pub fn restock(&mut self, added: u32) -> DomainResult<()> {
        self.quantity = self
            .quantity
            .checked_add(added)
            .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One entry of a stock decrement request: take `quantity` units of `product_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ValueObject for StockAdjustment {}
