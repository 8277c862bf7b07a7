//! Analysis and prediction results
//!
//! Both tables share one shape: a JSON payload attached to a dataset.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResultRow {
    pub id: String,
    pub results: Json<Value>,
    pub data_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResultRow {
    pub fn new(data_id: &str, results: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            results: Json(results),
            data_id: data_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Copy)]
struct ResultTable<'a> {
    pool: &'a SqlitePool,
    table: &'static str,
}

impl<'a> ResultTable<'a> {
    async fn insert(&self, row: &ResultRow) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, results, data_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&row.id)
            .bind(&row.results)
            .bind(&row.data_id)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ResultRow>> {
        let sql = format!(
            "SELECT id, results, data_id, created_at, updated_at FROM {} WHERE id = ?",
            self.table
        );
        let row = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }
}

pub struct AnalysisRepository<'a> {
    inner: ResultTable<'a>,
}

impl<'a> AnalysisRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            inner: ResultTable { pool, table: "analysis" },
        }
    }

    pub async fn insert(&self, row: &ResultRow) -> Result<()> {
        self.inner.insert(row).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ResultRow>> {
        self.inner.find_by_id(id).await
    }
}

pub struct PredictionRepository<'a> {
    inner: ResultTable<'a>,
}

impl<'a> PredictionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            inner: ResultTable { pool, table: "prediction" },
        }
    }

    pub async fn insert(&self, row: &ResultRow) -> Result<()> {
        self.inner.insert(row).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ResultRow>> {
        self.inner.find_by_id(id).await
    }
}
