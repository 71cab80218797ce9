//! Claim persistence backends

use crate::claims::{validate_claims, ClaimStore};
use crate::error::ResearchError;
use crate::models::{Claim, ClaimStatus, VerificationReport};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> ResearchError {
    move |e| ResearchError::DatabaseError(format!("{}: {}", context, e))
}

/// SQLite-backed claim store.
///
/// One writer at a time: every insert and report runs under a store-wide
/// lock, so a report never observes half of a batch.
pub struct SqliteClaimStore {
    pool: SqlitePool,
    lock: Mutex<()>,
}

impl SqliteClaimStore {
    /// Open (creating if missing) the database named by a `sqlite:` url
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_error("Invalid claims database url"))?
            .create_if_missing(true);
        Self::open(options).await
    }

    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::open(options).await
    }

    /// Private, process-local database
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn open(options: SqliteConnectOptions) -> Result<Self> {
        // a single connection keeps `:memory:` databases alive and shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to open claims database"))?;

        let store = Self {
            pool,
            lock: Mutex::new(()),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claims (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              claim TEXT NOT NULL,
              sources TEXT,
              status TEXT NOT NULL DEFAULT 'unverified',
              created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to initialize claims schema"))?;

        Ok(())
    }
}

#[async_trait]
impl ClaimStore for SqliteClaimStore {
    async fn insert(&self, claims: &[String], source: &str) -> Result<()> {
        validate_claims(claims)?;
        if claims.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin claims transaction"))?;

        for claim in claims {
            sqlx::query("INSERT INTO claims (claim, sources, created_at) VALUES (?, ?, ?)")
                .bind(claim.trim())
                .bind(source)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert claim"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit claims transaction"))?;

        debug!(count = claims.len(), source, "Stored claims");
        Ok(())
    }

    async fn report(&self) -> Result<VerificationReport> {
        let _guard = self.lock.lock().await;

        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM claims GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to read verification report"))?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let status: Option<String> = row
                .try_get("status")
                .map_err(db_error("Failed to decode claim status"))?;
            let count: i64 = row
                .try_get("count")
                .map_err(db_error("Failed to decode claim count"))?;

            let status = status.as_deref().unwrap_or(ClaimStatus::Unverified.as_str());
            match ClaimStatus::from_str(status) {
                Ok(status) => counts.push((status, count.max(0) as u64)),
                Err(e) => warn!(error = %e, count, "Skipping claims with unknown status"),
            }
        }

        Ok(VerificationReport::from_counts(counts))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Claim>> {
        let _guard = self.lock.lock().await;

        let rows = sqlx::query(
            r#"
            SELECT id, claim, sources, status, created_at
            FROM claims
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list claims"))?;

        let mut claims = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(claim) = claim_from_row(&row)? {
                claims.push(claim);
            }
        }

        Ok(claims)
    }
}

/// Decode one claims row. Rows with a status this build does not know are
/// skipped, matching the report.
fn claim_from_row(row: &SqliteRow) -> Result<Option<Claim>> {
    let id: i64 = row.try_get("id").map_err(db_error("Failed to decode claim id"))?;
    let status: Option<String> = row
        .try_get("status")
        .map_err(db_error("Failed to decode claim status"))?;
    let status = status.as_deref().unwrap_or(ClaimStatus::Unverified.as_str());
    let status = match ClaimStatus::from_str(status) {
        Ok(status) => status,
        Err(e) => {
            warn!(id, error = %e, "Skipping claim with unknown status");
            return Ok(None);
        }
    };

    Ok(Some(Claim {
        id,
        text: row
            .try_get("claim")
            .map_err(db_error("Failed to decode claim text"))?,
        source: row
            .try_get::<Option<String>, _>("sources")
            .map_err(db_error("Failed to decode claim source"))?
            .unwrap_or_default(),
        status,
        created_at: row
            .try_get("created_at")
            .map_err(db_error("Failed to decode claim timestamp"))?,
    }))
}

/// Process-local claim store used when no database is reachable
#[derive(Default)]
pub struct InMemoryClaimStore {
    claims: Mutex<Vec<Claim>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn insert(&self, claims: &[String], source: &str) -> Result<()> {
        validate_claims(claims)?;

        let mut stored = self.claims.lock().await;
        let now = Utc::now();
        for text in claims {
            let id = stored.len() as i64 + 1;
            stored.push(Claim {
                id,
                text: text.trim().to_string(),
                source: source.to_string(),
                status: ClaimStatus::Unverified,
                created_at: now,
            });
        }
        Ok(())
    }

    async fn report(&self) -> Result<VerificationReport> {
        let stored = self.claims.lock().await;
        Ok(VerificationReport::from_counts(
            stored.iter().map(|c| (c.status, 1)),
        ))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Claim>> {
        let stored = self.claims.lock().await;
        Ok(stored.iter().rev().take(limit as usize).cloned().collect())
    }
}

/// Open the configured store, degrading to in-memory when the database
/// cannot be opened.
pub async fn open_claim_store(database_url: &str) -> std::sync::Arc<dyn ClaimStore> {
    match SqliteClaimStore::connect(database_url).await {
        Ok(store) => {
            info!(database_url, "Claim store backend: sqlite");
            std::sync::Arc::new(store)
        }
        Err(error) => {
            warn!(
                "Failed to open claims database, falling back to in-memory: {}",
                error
            );
            std::sync::Arc::new(InMemoryClaimStore::new())
        }
    }
}
