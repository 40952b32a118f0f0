//! Product service and its derived reads.
//!
//! Every figure here is computed from the container on each call.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::service::EntityService;
use crate::shared::models::{Product, StockStatus};

pub type ProductService = EntityService<Product>;

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductOrder {
    /// Most recently registered first
    #[default]
    Newest,
    Oldest,
    Name,
    PriceDesc,
}

/// Per-category totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRollup {
    pub category: String,
    pub products: usize,
    pub units: i64,
    pub value: f64,
}

impl EntityService<Product> {
    /// Sum of price × stock
    pub fn inventory_value(&self) -> f64 {
        self.all().iter().map(Product::value).sum()
    }

    /// Total units in stock
    pub fn total_units(&self) -> i64 {
        self.all().iter().map(Product::units).sum()
    }

    /// Products still in stock but under `threshold`
    pub fn low_stock(&self, threshold: i64) -> Vec<Product> {
        self.find_by(|p| p.status(threshold) == StockStatus::Low)
    }

    pub fn out_of_stock(&self) -> Vec<Product> {
        self.find_by(|p| p.stock <= 0)
    }

    pub fn stock_status(stock: i64, threshold: i64) -> StockStatus {
        StockStatus::for_stock(stock, threshold)
    }

    pub fn by_category(&self, category: &str) -> Vec<Product> {
        self.find_by(|p| p.category == category)
    }

    /// Case-insensitive match on the name
    pub fn search(&self, term: &str) -> Vec<Product> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.all().to_vec();
        }
        self.find_by(|p| p.name.to_lowercase().contains(&term))
    }

    pub fn sorted(&self, order: ProductOrder) -> Vec<Product> {
        let mut products = self.all().to_vec();
        match order {
            // Dates are ISO formatted, so string order is date order; ties keep insertion order.
            ProductOrder::Newest => {
                products.reverse();
                products.sort_by(|a, b| b.date.cmp(&a.date));
            }
            ProductOrder::Oldest => products.sort_by(|a, b| a.date.cmp(&b.date)),
            ProductOrder::Name => products.sort_by_key(|p| p.name.to_lowercase()),
            ProductOrder::PriceDesc => {
                products.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal))
            }
        }
        products
    }

    /// Totals per category name, alphabetical
    pub fn category_rollups(&self) -> Vec<CategoryRollup> {
        let mut rollups: BTreeMap<String, CategoryRollup> = BTreeMap::new();
        for product in self.all().iter() {
            let rollup = rollups
                .entry(product.category.clone())
                .or_insert_with(|| CategoryRollup {
                    category: product.category.clone(),
                    products: 0,
                    units: 0,
                    value: 0.0,
                });
            rollup.products += 1;
            rollup.units += product.units();
            rollup.value += product.value();
        }
        rollups.into_values().collect()
    }
}
