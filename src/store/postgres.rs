//! PostgreSQL store: renders list-query fragments with `crate::sql` and runs them on a pool.

use super::Store;
use crate::error::StoreError;
use crate::query::ListQuery;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore {
            pool,
            schema: "public".to_string(),
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Tables live in `schema` instead of `public`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_json).collect()
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Value>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(row_json).transpose()
    }
}

fn row_json(row: &PgRow) -> Result<Value, StoreError> {
    Ok(row.try_get::<Value, _>("row")?)
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, query: &ListQuery) -> Result<i64, StoreError> {
        let q = sql::count(&self.schema, query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut count = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            count = count.bind(p.clone());
        }
        Ok(count.fetch_one(&self.pool).await?)
    }

    async fn fetch(&self, query: &ListQuery) -> Result<Vec<Value>, StoreError> {
        self.query_many(&sql::select_list(&self.schema, query)).await
    }

    async fn find_by_id(&self, table: &str, pk: &str, id: u64) -> Result<Option<Value>, StoreError> {
        self.query_optional(&sql::select_by_id(&self.schema, table, pk, id))
            .await
    }

    async fn insert(&self, table: &str, pk: &str, row: Value) -> Result<Value, StoreError> {
        let Value::Object(fields) = row else {
            return Err(StoreError::NotAnObject);
        };
        let q = sql::insert(&self.schema, table, pk, &fields);
        self.query_optional(&q)
            .await?
            .ok_or(StoreError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, table: &str, pk: &str, id: u64, row: Value) -> Result<Value, StoreError> {
        let Value::Object(fields) = row else {
            return Err(StoreError::NotAnObject);
        };
        let q = sql::update(&self.schema, table, pk, id, &fields);
        self.query_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Missing {
                table: table.to_string(),
                pk: pk.to_string(),
                id,
            })
    }

    async fn delete(&self, table: &str, pk: &str, id: u64) -> Result<(), StoreError> {
        let q = sql::delete(&self.schema, table, pk, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let done = query.execute(&self.pool).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::Missing {
                table: table.to_string(),
                pk: pk.to_string(),
                id,
            });
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
