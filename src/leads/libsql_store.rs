//! libSQL lead store — local file or in-memory database.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::migrations;
use super::{Lead, LeadStore};
use crate::error::DatabaseError;

const LEAD_COLUMNS: &str =
    "id, phone, customer_name, category, category_name, machine, machine_name, created_at";

/// libSQL-backed [`LeadStore`].
///
/// Holds one connection reused for all operations.
pub struct LibSqlLeadStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlLeadStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let store = Self::open(path.to_string_lossy().as_ref()).await?;
        info!(path = %path.display(), "Lead database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        Self::open(":memory:").await
    }

    async fn open(target: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(target)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn row_to_lead(row: &libsql::Row) -> Result<Lead, libsql::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(7)?;
    Ok(Lead {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        phone: row.get(1)?,
        customer_name: row.get::<String>(2).ok(),
        category: row.get(3)?,
        category_name: row.get(4)?,
        machine: row.get(5)?,
        machine_name: row.get(6)?,
        created_at: parse_datetime(&created_str),
    })
}

#[async_trait]
impl LeadStore for LibSqlLeadStore {
    async fn record(&self, lead: &Lead) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!("INSERT INTO leads ({LEAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    lead.id.to_string(),
                    lead.phone.clone(),
                    opt_text(lead.customer_name.as_deref()),
                    lead.category.clone(),
                    lead.category_name.clone(),
                    lead.machine.clone(),
                    lead.machine_name.clone(),
                    lead.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record lead: {e}")))?;

        debug!(lead_id = %lead.id, phone = %lead.phone, "Lead inserted into DB");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Lead>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC, rowid DESC LIMIT ?1"),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent leads: {e}")))?;

        let mut leads = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("recent leads: {e}")))?
        {
            let lead = row_to_lead(&row)
                .map_err(|e| DatabaseError::Query(format!("lead row parse: {e}")))?;
            leads.push(lead);
        }
        Ok(leads)
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM leads", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count leads: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count leads: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count leads: {e}"))),
        }
    }
}
