//! Order placement input.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult, ProductId};
use orderdesk_products::StockAdjustment;

/// One requested product and how many units of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProduct {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedProduct {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Input to order placement, as received from the calling layer.
///
/// `customer_id` is kept raw; placement rejects it unless it parses as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_id: String,
    pub products: Vec<RequestedProduct>,
}

impl OrderRequest {
    pub fn new(customer_id: impl Into<String>, products: Vec<RequestedProduct>) -> Self {
        Self {
            customer_id: customer_id.into(),
            products,
        }
    }
}

/// Requested quantity per product, built once per placement.
///
/// Repeated entries for the same product are merged by summing their
/// quantities. Product ids keep first-seen request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedQuantities {
    order: Vec<ProductId>,
    quantities: HashMap<ProductId, u32>,
}

impl RequestedQuantities {
    pub fn from_request(products: &[RequestedProduct]) -> DomainResult<Self> {
        let mut merged = Self::default();
        for requested in products {
            if requested.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity for product {} must be positive",
                    requested.product_id
                )));
            }
            match merged.quantities.get_mut(&requested.product_id) {
                Some(total) => {
                    *total = total.checked_add(requested.quantity).ok_or_else(|| {
                        DomainError::invariant(format!(
                            "requested quantity overflow for product {}",
                            requested.product_id
                        ))
                    })?;
                }
                None => {
                    merged.order.push(requested.product_id);
                    merged.quantities.insert(requested.product_id, requested.quantity);
                }
            }
        }
        Ok(merged)
    }

    /// Distinct product ids, in request order.
    pub fn product_ids(&self) -> &[ProductId] {
        &self.order
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.quantities.get(&product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stock decrement for every requested product, found or not.
    pub fn adjustments(&self) -> Vec<StockAdjustment> {
        self.order
            .iter()
            .filter_map(|id| {
                self.quantity_of(*id).map(|quantity| StockAdjustment {
                    product_id: *id,
                    quantity,
                })
            })
            .collect()
    }
}
