//! Product records

use serde::{Deserialize, Serialize};

use super::{Entity, LocalId, RemoteRef};
use crate::shared::error::SyncResult;
use crate::store::Document;

/// Stock level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    Low,
    OutOfStock,
}

impl StockStatus {
    pub fn for_stock(stock: i64, threshold: i64) -> Self {
        if stock <= 0 {
            Self::OutOfStock
        } else if stock < threshold {
            Self::Low
        } else {
            Self::Available
        }
    }
}

/// A product held in inventory
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: LocalId,
    pub remote_ref: RemoteRef,
    pub name: String,
    /// Date the product was registered, `YYYY-MM-DD`
    pub date: String,
    /// Category name
    pub category: String,
    pub price: f64,
    pub stock: i64,
}

impl Product {
    /// Units on hand; negative stock counts as none
    pub fn units(&self) -> i64 {
        self.stock.max(0)
    }

    pub fn value(&self) -> f64 {
        self.price * self.units() as f64
    }

    pub fn status(&self, threshold: i64) -> StockStatus {
        StockStatus::for_stock(self.stock, threshold)
    }
}

/// Fields of a new product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha", default)]
    pub date: String,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "precio")]
    pub price: f64,
    pub stock: i64,
}

impl ProductDraft {
    /// Draft dated today without a category
    pub fn new(name: impl Into<String>, price: f64, stock: i64) -> Self {
        Self {
            name: name.into(),
            date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
            category: String::new(),
            price,
            stock,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }
}

/// Partial product update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "fecha", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "categoria", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "precio", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

impl ProductPatch {
    pub fn stock(stock: i64) -> Self {
        Self {
            stock: Some(stock),
            ..Self::default()
        }
    }

    pub fn price(price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::default()
        }
    }
}

impl Entity for Product {
    type Draft = ProductDraft;
    type Patch = ProductPatch;

    const COLLECTION: &'static str = "productos";

    fn local_id(&self) -> LocalId {
        self.id
    }

    fn remote_ref(&self) -> &RemoteRef {
        &self.remote_ref
    }

    fn from_document(local_id: LocalId, document: &Document) -> SyncResult<Self> {
        let draft: ProductDraft = document.decode()?;
        Ok(Self {
            id: local_id,
            remote_ref: document.remote_ref.clone(),
            name: draft.name,
            date: draft.date,
            category: draft.category,
            price: draft.price,
            stock: draft.stock,
        })
    }

    fn apply_patch(&mut self, patch: &ProductPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(date) = &patch.date {
            self.date = date.clone();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
    }
}
