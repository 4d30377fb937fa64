//! Infrastructure layer: store implementations for order placement.
//!
//! Production backends live with the host application; this crate provides
//! the in-memory reference stores used by tests and local development.

pub mod in_memory;

pub use in_memory::{InMemoryDatabase, InMemoryPlacementService, InMemoryTransaction};

#[cfg(test)]
mod integration_tests;
