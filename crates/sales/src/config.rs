//! Placement settings, loadable from the process environment.

use core::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use orderdesk_core::{DomainError, DomainResult};

pub const MISSING_PRODUCTS_ENV: &str = "ORDERDESK_MISSING_PRODUCTS";
pub const STORE_TIMEOUT_ENV: &str = "ORDERDESK_STORE_TIMEOUT_MS";

/// What to do when some, but not all, requested products do not exist.
///
/// A request where *no* product exists always fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingProductPolicy {
    /// Place the order with the products that were found; drop the rest.
    #[default]
    Skip,
    /// Fail the placement, listing the missing product ids.
    Reject,
}

impl FromStr for MissingProductPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            other => Err(DomainError::validation(format!(
                "{MISSING_PRODUCTS_ENV} must be 'skip' or 'reject', got '{other}'"
            ))),
        }
    }
}

/// Tunables for [`crate::OrderPlacementService`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub missing_products: MissingProductPolicy,
    /// Deadline applied to a placement whose caller did not set one.
    pub store_timeout_ms: Option<u64>,
}

impl PlacementSettings {
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }

    /// Load from `ORDERDESK_MISSING_PRODUCTS` and `ORDERDESK_STORE_TIMEOUT_MS`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(MISSING_PRODUCTS_ENV) {
            settings.missing_products = raw.parse()?;
        }

        if let Some(raw) = lookup(STORE_TIMEOUT_ENV) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                DomainError::validation(format!("{STORE_TIMEOUT_ENV} must be milliseconds: {e}"))
            })?;
            // 0 disables the default deadline.
            settings.store_timeout_ms = (ms > 0).then_some(ms);
        }

        Ok(settings)
    }
}
