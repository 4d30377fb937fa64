//! Parties domain module (customers).
//!
//! Order placement only needs to know that a customer exists; the customer
//! record itself is owned by the customer store.

pub mod customer;

pub use customer::{ContactInfo, Customer};
