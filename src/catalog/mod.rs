//! Catalog lookup — read-only category and machine reference data.
//!
//! The conversation engine only ever reads through [`CatalogLookup`]; where
//! the data comes from (built-in table, JSON file) is decided at startup.

pub mod static_catalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

pub use static_catalog::StaticCatalog;

/// Most entries one menu can show; a WhatsApp list message holds at most 10 rows.
pub const MAX_MENU_ENTRIES: usize = 10;

/// A machine offered for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A product category and the machines listed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub machines: Vec<Machine>,
}

/// Read-only access to the catalog.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// All categories, in display order.
    async fn categories(&self) -> Result<Vec<Category>, CatalogError>;

    /// A single category by slug.
    async fn category(&self, slug: &str) -> Result<Option<Category>, CatalogError>;

    /// A machine by slug, restricted to the given category.
    async fn machine(
        &self,
        category_slug: &str,
        machine_slug: &str,
    ) -> Result<Option<Machine>, CatalogError> {
        Ok(self
            .category(category_slug)
            .await?
            .and_then(|c| c.machines.into_iter().find(|m| m.slug == machine_slug)))
    }
}
