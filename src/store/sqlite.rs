// src/store/sqlite.rs
//! SQLite-backed `ContentStore` (sqlx). The dedup gate rides on the
//! UNIQUE(owner_id, natural_key) constraint: `upsert` is a single
//! `INSERT ... ON CONFLICT DO NOTHING` followed by a read-back, so there is
//! no check-then-insert window between concurrent runs.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{ContentItem, ContentStore, NaturalKey, NewContentItem, UpsertOutcome};
use crate::aggregate::types::Source;
use crate::oauth::StoredCredentials;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and run migrations. A connection failure here is the fatal
    /// startup error that aborts runs before any adapter executes.
    pub async fn connect(database_url: &str) -> Result<Self> {
        // One connection: SQLite serializes writers anyway, and `:memory:`
        // databases are per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .with_context(|| format!("connecting content store at {database_url}"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running content store migrations")?;
        Ok(Self { pool })
    }
}

const ITEM_COLUMNS: &str = "id, owner_id, title, content_type, platform, original_url, author, \
     summary, full_content, metadata, folder_id, natural_key, created_at, updated_at";

fn item_from_row(row: &SqliteRow) -> Result<ContentItem> {
    let metadata_raw: String = row.try_get("metadata")?;
    Ok(ContentItem {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        content_type: row.try_get("content_type")?,
        platform: row.try_get("platform")?,
        original_url: row.try_get("original_url")?,
        author: row.try_get("author")?,
        summary: row.try_get("summary")?,
        full_content: row.try_get("full_content")?,
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::Value::Null),
        folder_id: row.try_get("folder_id")?,
        natural_key: row.try_get("natural_key")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let platforms_raw: String = row.try_get("selected_platforms")?;
    let identifiers_raw: String = row.try_get("platform_identifiers")?;
    Ok(Source {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        source_name: row.try_get("source_name")?,
        selected_platforms: serde_json::from_str(&platforms_raw).unwrap_or_default(),
        platform_identifiers: serde_json::from_str(&identifiers_raw).unwrap_or_default(),
    })
}

#[async_trait::async_trait]
impl ContentStore for SqliteStore {
    async fn exists(&self, owner_id: &str, key: &NaturalKey) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 AS hit FROM content_items WHERE owner_id = ?1 AND natural_key = ?2",
        )
        .bind(owner_id)
        .bind(key.encode())
        .fetch_optional(&self.pool)
        .await
        .context("dedup existence check")?;
        Ok(row.is_some())
    }

    async fn upsert(&self, item: NewContentItem) -> Result<UpsertOutcome> {
        let natural_key = item.natural_key.encode();
        let now = Utc::now().to_rfc3339();
        let id = uuid::Uuid::new_v4().to_string();
        let metadata = serde_json::to_string(&item.metadata).unwrap_or_else(|_| "{}".to_string());

        let inserted = sqlx::query(
            r#"
            INSERT INTO content_items
              (id, owner_id, title, content_type, platform, original_url, author,
               summary, full_content, metadata, folder_id, natural_key, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?12, ?12)
            ON CONFLICT(owner_id, natural_key) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&item.owner_id)
        .bind(&item.title)
        .bind(&item.content_type)
        .bind(&item.platform)
        .bind(&item.original_url)
        .bind(&item.author)
        .bind(&item.summary)
        .bind(&item.full_content)
        .bind(&metadata)
        .bind(&natural_key)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("content item insert")?
        .rows_affected()
            == 1;

        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_items WHERE owner_id = ?1 AND natural_key = ?2"
        ))
        .bind(&item.owner_id)
        .bind(&natural_key)
        .fetch_one(&self.pool)
        .await
        .context("content item read-back")?;
        let stored = item_from_row(&row)?;

        Ok(if inserted {
            UpsertOutcome::Inserted(stored)
        } else {
            UpsertOutcome::Existing(stored)
        })
    }

    async fn items_for_owner(&self, owner_id: &str) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_items WHERE owner_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .context("listing content items")?;
        rows.iter().map(item_from_row).collect()
    }

    async fn recent_uploads(&self, owner_id: &str, max_items: usize) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_items \
             WHERE owner_id = ?1 AND platform = 'uploads' \
             ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(owner_id)
        .bind(max_items as i64)
        .fetch_all(&self.pool)
        .await
        .context("listing uploads")?;
        rows.iter().map(item_from_row).collect()
    }

    async fn save_source(&self, source: &Source) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let platforms =
            serde_json::to_string(&source.selected_platforms).unwrap_or_else(|_| "[]".into());
        let identifiers =
            serde_json::to_string(&source.platform_identifiers).unwrap_or_else(|_| "{}".into());
        sqlx::query(
            r#"
            INSERT INTO sources (id, owner_id, source_name, selected_platforms,
                                 platform_identifiers, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(id) DO UPDATE SET
              source_name = excluded.source_name,
              selected_platforms = excluded.selected_platforms,
              platform_identifiers = excluded.platform_identifiers,
              updated_at = excluded.updated_at
            "#,
        )
        .bind(&source.id)
        .bind(&source.owner_id)
        .bind(&source.source_name)
        .bind(&platforms)
        .bind(&identifiers)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("saving source")?;
        Ok(())
    }

    async fn sources_for_owner(&self, owner_id: &str) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, source_name, selected_platforms, platform_identifiers \
             FROM sources WHERE owner_id = ?1 ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .context("listing sources")?;
        rows.iter().map(source_from_row).collect()
    }

    async fn owners_with_sources(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT owner_id FROM sources ORDER BY owner_id")
            .fetch_all(&self.pool)
            .await
            .context("listing owners")?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("owner_id").map_err(Into::into))
            .collect()
    }

    async fn load_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
    ) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, expires_at FROM oauth_credentials \
             WHERE owner_id = ?1 AND source_kind = ?2",
        )
        .bind(owner_id)
        .bind(source_kind)
        .fetch_optional(&self.pool)
        .await
        .context("loading oauth credentials")?;
        match row {
            None => Ok(None),
            Some(row) => Ok(Some(StoredCredentials {
                access_token: row.try_get("access_token")?,
                refresh_token: row.try_get("refresh_token")?,
                expires_at: row.try_get("expires_at")?,
            })),
        }
    }

    async fn save_credentials(
        &self,
        owner_id: &str,
        source_kind: &str,
        creds: &StoredCredentials,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO oauth_credentials
              (owner_id, source_kind, access_token, refresh_token, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(owner_id, source_kind) DO UPDATE SET
              access_token = excluded.access_token,
              refresh_token = excluded.refresh_token,
              expires_at = excluded.expires_at,
              updated_at = excluded.updated_at
            "#,
        )
        .bind(owner_id)
        .bind(source_kind)
        .bind(&creds.access_token)
        .bind(&creds.refresh_token)
        .bind(creds.expires_at)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("saving oauth credentials")?;
        Ok(())
    }
}
