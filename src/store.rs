use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::types::{
    Analysis, Candidate, Enrichment, InsertOutcome, Item, ItemStatus, Result, SourceConfig,
};

/// Persistent store for sources, items, and enrichment results. The UNIQUE
/// constraint on `items.url` is the final authority on deduplication; the
/// existence checks here are optimizations in front of it.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // One connection keeps writes serialized and makes `:memory:`
        // databases behave in tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                key TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                added_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                url TEXT PRIMARY KEY,
                source_key TEXT NOT NULL REFERENCES sources(key),
                title TEXT NOT NULL,
                published_at TEXT,
                content TEXT,
                status TEXT NOT NULL DEFAULT 'new',
                failure_reason TEXT,
                created_at TEXT NOT NULL,
                delivered_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS enrichments (
                id TEXT PRIMARY KEY,
                item_url TEXT NOT NULL UNIQUE REFERENCES items(url),
                summary TEXT NOT NULL,
                key_concept TEXT NOT NULL,
                social_post TEXT NOT NULL,
                explanation TEXT NOT NULL,
                model_id TEXT NOT NULL,
                prompt_version TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_source_key ON items(source_key)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_status ON items(status)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register a source row if it is not already present.
    pub async fn upsert_source(&self, source: &SourceConfig, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO sources (key, name, kind, endpoint, added_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(&source.key)
        .bind(&source.name)
        .bind(source.kind.as_str())
        .bind(&source.endpoint)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// True iff the store holds at least one item for the source, any state.
    /// Cold-start decision only, never per-item dedup.
    pub async fn has_any_history(&self, source_key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM items WHERE source_key = ? LIMIT 1")
            .bind(source_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn item_exists(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM items WHERE url = ? LIMIT 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Create-if-absent insert in state `new`. A URL collision (including a
    /// race with a concurrent run) reports `AlreadyExists`.
    pub async fn insert_item(
        &self,
        source_key: &str,
        candidate: &Candidate,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO items (url, source_key, title, published_at, content, status, created_at)
             VALUES (?, ?, ?, ?, ?, 'new', ?)
             ON CONFLICT(url) DO NOTHING",
        )
        .bind(&candidate.url)
        .bind(source_key)
        .bind(&candidate.title)
        .bind(candidate.published_at)
        .bind(&candidate.content)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Created)
        }
    }

    pub async fn item_status(&self, url: &str) -> Result<Option<ItemStatus>> {
        let row = sqlx::query("SELECT status FROM items WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                Ok(Some(ItemStatus::parse(&status)?))
            }
            None => Ok(None),
        }
    }

    pub async fn get_item(&self, url: &str) -> Result<Option<Item>> {
        let row = sqlx::query(
            "SELECT url, source_key, title, published_at, content, status, failure_reason,
                    created_at, delivered_at
             FROM items WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| item_from_row(&r)).transpose()
    }

    /// Mark a `new` item failed with a diagnostic reason. A no-op for items
    /// that already left the `new` state.
    pub async fn mark_failed(&self, url: &str, reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE items SET status = 'failed', failure_reason = ? WHERE url = ? AND status = 'new'",
        )
        .bind(reason)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Write the enrichment row and flip the item to `enriched` in one
    /// transaction. Returns false without writing anything when the item is
    /// no longer in state `new` (lost a race, or already processed).
    pub async fn record_enrichment(
        &self,
        item_url: &str,
        analysis: &Analysis,
        model_id: &str,
        prompt_version: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE items SET status = 'enriched', failure_reason = NULL
             WHERE url = ? AND status = 'new'",
        )
        .bind(item_url)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO enrichments
                 (id, item_url, summary, key_concept, social_post, explanation,
                  model_id, prompt_version, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(item_url)
        .bind(&analysis.summary)
        .bind(&analysis.key_concept)
        .bind(&analysis.social_post)
        .bind(&analysis.explanation)
        .bind(model_id)
        .bind(prompt_version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Explicit owned-result lookup; items carry no implicit back-reference.
    pub async fn enrichment_for(&self, item_url: &str) -> Result<Option<Enrichment>> {
        let row = sqlx::query(
            "SELECT id, item_url, summary, key_concept, social_post, explanation,
                    model_id, prompt_version, created_at
             FROM enrichments WHERE item_url = ?",
        )
        .bind(item_url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| enrichment_from_row(&r)).transpose()
    }

    /// Enriched items whose enrichment landed in the window, most recently
    /// published first (creation time stands in for undated items).
    pub async fn enriched_in_window(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        max_items: usize,
    ) -> Result<Vec<(Item, Enrichment)>> {
        let rows = sqlx::query(
            "SELECT i.url, i.source_key, i.title, i.published_at, i.content, i.status,
                    i.failure_reason, i.created_at, i.delivered_at,
                    e.id AS e_id, e.item_url AS e_item_url, e.summary, e.key_concept,
                    e.social_post, e.explanation, e.model_id, e.prompt_version,
                    e.created_at AS e_created_at
             FROM items i
             JOIN enrichments e ON e.item_url = i.url
             WHERE i.status = 'enriched' AND e.created_at >= ? AND e.created_at <= ?
             ORDER BY COALESCE(i.published_at, i.created_at) DESC
             LIMIT ?",
        )
        .bind(window_start)
        .bind(window_end)
        .bind(max_items as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let item = item_from_row(row)?;
                let enrichment = Enrichment {
                    id: parse_uuid(row.try_get("e_id")?)?,
                    item_url: row.try_get("e_item_url")?,
                    summary: row.try_get("summary")?,
                    key_concept: row.try_get("key_concept")?,
                    social_post: row.try_get("social_post")?,
                    explanation: row.try_get("explanation")?,
                    model_id: row.try_get("model_id")?,
                    prompt_version: row.try_get("prompt_version")?,
                    created_at: row.try_get("e_created_at")?,
                };
                Ok((item, enrichment))
            })
            .collect()
    }

    /// Delivery bookkeeping for the items a digest shipped.
    pub async fn mark_delivered(&self, urls: &[String], now: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for url in urls {
            sqlx::query("UPDATE items SET delivered_at = ? WHERE url = ?")
                .bind(now)
                .bind(url)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn count_items(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn item_from_row(row: &SqliteRow) -> Result<Item> {
    let status: String = row.try_get("status")?;
    Ok(Item {
        url: row.try_get("url")?,
        source_key: row.try_get("source_key")?,
        title: row.try_get("title")?,
        published_at: row.try_get("published_at")?,
        content: row.try_get("content")?,
        status: ItemStatus::parse(&status)?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        delivered_at: row.try_get("delivered_at")?,
    })
}

fn enrichment_from_row(row: &SqliteRow) -> Result<Enrichment> {
    Ok(Enrichment {
        id: parse_uuid(row.try_get("id")?)?,
        item_url: row.try_get("item_url")?,
        summary: row.try_get("summary")?,
        key_concept: row.try_get("key_concept")?,
        social_post: row.try_get("social_post")?,
        explanation: row.try_get("explanation")?,
        model_id: row.try_get("model_id")?,
        prompt_version: row.try_get("prompt_version")?,
        created_at: row.try_get("created_at")?,
    })
}

fn parse_uuid(raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw)
        .map_err(|e| crate::types::NewsbriefError::Parse(format!("bad uuid in store: {e}")))
}
