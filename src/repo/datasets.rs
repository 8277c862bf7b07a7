use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Metadata of an uploaded file; the file itself lives in the file store
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DatasetRow {
    pub id: String,
    /// Path relative to the storage root, `data/<id>.<ext>`
    pub uri: String,
    pub extension: String,
    pub original_name: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct DatasetRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DatasetRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, row: &DatasetRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO data (id, uri, extension, original_name, size, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.uri)
        .bind(&row.extension)
        .bind(&row.original_name)
        .bind(row.size)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<DatasetRow>> {
        let row = sqlx::query_as::<_, DatasetRow>(
            r#"
            SELECT id, uri, extension, original_name, size, created_at, updated_at
            FROM data
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }
}
