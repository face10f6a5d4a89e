//! Persistence collaborator: accepts structured query fragments, returns JSON rows, counts or errors.
//! One logical unit of work per call; pooling and transactions belong to the implementation.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::query::ListQuery;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching `query`, ignoring its offset and limit.
    async fn count(&self, query: &ListQuery) -> Result<i64, StoreError>;

    /// Rows matching `query`, ordered and bounded.
    async fn fetch(&self, query: &ListQuery) -> Result<Vec<Value>, StoreError>;

    async fn find_by_id(&self, table: &str, pk: &str, id: u64) -> Result<Option<Value>, StoreError>;

    /// Insert `row` (a JSON object). A zero or null primary key is assigned by the store.
    async fn insert(&self, table: &str, pk: &str, row: Value) -> Result<Value, StoreError>;

    /// Replace the fields present in `row` on the row with primary key `id`.
    async fn update(&self, table: &str, pk: &str, id: u64, row: Value) -> Result<Value, StoreError>;

    async fn delete(&self, table: &str, pk: &str, id: u64) -> Result<(), StoreError>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Text form used when comparing stored values with query-string values.
pub(crate) fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// True when a JSON primary key means "not assigned yet".
pub(crate) fn is_unassigned(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_u64() == Some(0),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
