//! Product stock configuration, read by the alert engine.
//!
//! Products are managed outside this core; only the fields that stock
//! evaluation needs are modeled here.

use serde::{Deserialize, Serialize};

use replenish_core::{CategoryId, Entity, ProductId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductProfile {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub reorder_point: i64,
}

impl ProductProfile {
    pub fn new(product_id: ProductId, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            name: name.into(),
            category_id: None,
            min_stock_level: 0,
            max_stock_level: None,
            reorder_point: 0,
        }
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_max_stock(mut self, max_stock_level: i64) -> Self {
        self.max_stock_level = Some(max_stock_level);
        self
    }
}

impl Entity for ProductProfile {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.product_id
    }
}
