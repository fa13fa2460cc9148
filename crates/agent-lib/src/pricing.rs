//! Node hourly price lookup by instance type

use std::collections::HashMap;
use tracing::debug;

/// Resolves node hourly prices by instance type, case-insensitively
#[derive(Debug, Clone, Default)]
pub struct NodePriceLookup {
    prices: HashMap<String, f64>,
    default_price: f64,
}

impl NodePriceLookup {
    /// Build a lookup with normalized keys.
    ///
    /// Entries with an empty key or a negative price are dropped.
    pub fn new<I, K>(prices: I, default_price: f64) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut normalized = HashMap::new();
        for (instance_type, price) in prices {
            let instance_type = instance_type.as_ref();
            if instance_type.is_empty() || price < 0.0 {
                debug!(instance_type, price, "Ignoring invalid instance price");
                continue;
            }
            normalized.insert(instance_type.to_lowercase(), price);
        }

        Self {
            prices: normalized,
            default_price,
        }
    }

    /// Hourly cost for the instance type, or the default when unmatched
    pub fn price(&self, instance_type: &str) -> f64 {
        if instance_type.is_empty() {
            return self.default_price;
        }
        self.prices
            .get(&instance_type.to_lowercase())
            .copied()
            .unwrap_or(self.default_price)
    }

    pub fn default_price(&self) -> f64 {
        self.default_price
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Price lookup that tolerates an absent table; yields 0 when unset
pub fn price_or_zero(lookup: Option<&NodePriceLookup>, instance_type: &str) -> f64 {
    lookup.map(|l| l.price(instance_type)).unwrap_or(0.0)
}
