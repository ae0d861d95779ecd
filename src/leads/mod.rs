//! Lead capture — confirmed interest in a machine, and where it is stored.

pub mod libsql_store;
mod migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::DatabaseError;

pub use libsql_store::LibSqlLeadStore;

/// A sender confirmed interest in a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    /// Sender phone number.
    pub phone: String,
    pub customer_name: Option<String>,
    pub category: String,
    pub category_name: String,
    pub machine: String,
    pub machine_name: String,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        phone: impl Into<String>,
        customer_name: Option<String>,
        category: (&str, &str),
        machine: (&str, &str),
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone: phone.into(),
            customer_name,
            category: category.0.to_string(),
            category_name: category.1.to_string(),
            machine: machine.0.to_string(),
            machine_name: machine.1.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Backend-agnostic lead persistence.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Persist a new lead.
    async fn record(&self, lead: &Lead) -> Result<(), DatabaseError>;

    /// Most recent leads first, up to `limit`.
    async fn recent(&self, limit: usize) -> Result<Vec<Lead>, DatabaseError>;

    /// Total number of stored leads.
    async fn count(&self) -> Result<u64, DatabaseError>;
}

/// Leads kept in process memory. Lost on restart.
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn record(&self, lead: &Lead) -> Result<(), DatabaseError> {
        self.leads.write().await.push(lead.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Lead>, DatabaseError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().rev().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        Ok(self.leads.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_lead(machine: &str) -> Lead {
        Lead::new(
            "111",
            Some("Asha".into()),
            ("mixing", "Mixing Machines"),
            (machine, "Some Machine"),
        )
    }

    #[tokio::test]
    async fn memory_store_records_and_lists_newest_first() {
        let store = InMemoryLeadStore::new();
        store.record(&make_lead("first")).await.unwrap();
        store.record(&make_lead("second")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].machine, "second");
    }

    #[test]
    fn lead_ids_are_unique() {
        assert_ne!(make_lead("a").id, make_lead("a").id);
    }
}
