//! In-process store for tests, demos and local development. Same query semantics as `PgStore`.

use super::{is_unassigned, value_text, Store};
use crate::error::StoreError;
use crate::query::{Direction, ListQuery, OrderBy, Predicate};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Table {
    next_id: u64,
    rows: BTreeMap<u64, Value>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows directly; each row goes through the same id assignment as `insert`.
    pub fn with_rows(self, table: &str, pk: &str, rows: impl IntoIterator<Item = Value>) -> Self {
        {
            let mut tables = self.write();
            let t = tables.entry(table.to_string()).or_default();
            for row in rows {
                if let Value::Object(fields) = row {
                    insert_row(t, pk, fields);
                }
            }
        }
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn matching(&self, query: &ListQuery) -> Vec<Value> {
        let tables = self.read();
        let Some(table) = tables.get(&query.table) else {
            return Vec::new();
        };
        table
            .rows
            .values()
            .filter(|row| query.predicates.iter().all(|p| matches(row, p)))
            .cloned()
            .collect()
    }
}

fn insert_row(table: &mut Table, pk: &str, mut fields: Map<String, Value>) -> Value {
    let given = fields.get(pk).and_then(Value::as_u64).filter(|_| !is_unassigned(fields.get(pk)));
    let id = match given {
        Some(id) => id,
        None => table.next_id + 1,
    };
    table.next_id = table.next_id.max(id);
    fields.insert(pk.to_string(), Value::from(id));
    let row = Value::Object(fields);
    table.rows.insert(id, row.clone());
    row
}

fn field_text(row: &Value, field: &str) -> Option<String> {
    row.get(field).and_then(value_text)
}

fn matches(row: &Value, predicate: &Predicate) -> bool {
    let Some(text) = field_text(row, predicate.field()) else {
        return false;
    };
    match predicate {
        Predicate::Equals { value, .. } => text == *value,
        Predicate::In { values, .. } => values.iter().any(|v| *v == text),
        Predicate::Like { pattern, .. } => like(&text, pattern),
        Predicate::Year { year, .. } => {
            let prefix: String = text.chars().take(4).collect();
            prefix.len() == 4 && prefix.chars().all(|c| c.is_ascii_digit()) && prefix == *year
        }
    }
}

/// SQL `LIKE`: `%` matches any run, `_` one character.
fn like(text: &str, pattern: &str) -> bool {
    fn go(t: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|i| go(&t[i..], rest)),
            Some(('_', rest)) => !t.is_empty() && go(&t[1..], rest),
            Some((c, rest)) => t.first() == Some(c) && go(&t[1..], rest),
        }
    }
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    go(&t, &p)
}

fn numeric(v: Option<&Value>) -> Option<f64> {
    let text = value_text(v?)?;
    let body = text.strip_prefix('-').unwrap_or(&text);
    let mut parts = body.splitn(2, '.');
    let int = parts.next().unwrap_or_default();
    let frac = parts.next();
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if digits(int) && frac.map_or(true, digits) {
        text.parse().ok()
    } else {
        None
    }
}

/// Ascending comparison with nulls last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => value_text(x).cmp(&value_text(y)),
    }
}

fn compare_rows(a: &Value, b: &Value, order: &OrderBy) -> Ordering {
    let va = a.get(&order.field);
    let vb = b.get(&order.field);
    let mut ord = Ordering::Equal;
    if order.numeric_first {
        ord = match (numeric(va), numeric(vb)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
    }
    let ord = ord.then_with(|| compare_values(va, vb));
    match order.direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

/// Grouping key for distinct projections; a missing or null value is its own group.
fn distinct_key(row: &Value, field: &str) -> Option<String> {
    row.get(field).and_then(value_text)
}

fn distinct_values(rows: Vec<Value>, field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        if seen.insert(distinct_key(&row, field)) {
            let v = row.get(field).cloned().unwrap_or(Value::Null);
            let mut obj = Map::new();
            obj.insert(field.to_string(), v);
            out.push(Value::Object(obj));
        }
    }
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, query: &ListQuery) -> Result<i64, StoreError> {
        let rows = self.matching(query);
        let n = match &query.distinct {
            Some(field) => rows
                .iter()
                .map(|r| distinct_key(r, field))
                .collect::<HashSet<_>>()
                .len(),
            None => rows.len(),
        };
        Ok(n as i64)
    }

    async fn fetch(&self, query: &ListQuery) -> Result<Vec<Value>, StoreError> {
        let mut rows = self.matching(query);
        if let Some(field) = &query.distinct {
            rows = distinct_values(rows, field);
        }
        if let Some(order) = &query.order {
            if query.distinct.as_deref().map_or(true, |d| d == order.field) {
                rows.sort_by(|a, b| compare_rows(a, b, order));
            }
        }
        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = query
            .limit
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_id(&self, table: &str, _pk: &str, id: u64) -> Result<Option<Value>, StoreError> {
        Ok(self
            .read()
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .cloned())
    }

    async fn insert(&self, table: &str, pk: &str, row: Value) -> Result<Value, StoreError> {
        let Value::Object(fields) = row else {
            return Err(StoreError::NotAnObject);
        };
        let mut tables = self.write();
        Ok(insert_row(tables.entry(table.to_string()).or_default(), pk, fields))
    }

    async fn update(&self, table: &str, pk: &str, id: u64, row: Value) -> Result<Value, StoreError> {
        let Value::Object(fields) = row else {
            return Err(StoreError::NotAnObject);
        };
        let missing = || StoreError::Missing {
            table: table.to_string(),
            pk: pk.to_string(),
            id,
        };
        let mut tables = self.write();
        let existing = tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&id))
            .ok_or_else(missing)?;
        if let Value::Object(current) = existing {
            for (k, v) in fields {
                if k != pk {
                    current.insert(k, v);
                }
            }
        }
        Ok(existing.clone())
    }

    async fn delete(&self, table: &str, pk: &str, id: u64) -> Result<(), StoreError> {
        let mut tables = self.write();
        match tables.get_mut(table).and_then(|t| t.rows.remove(&id)) {
            Some(_) => Ok(()),
            None => Err(StoreError::Missing {
                table: table.to_string(),
                pk: pk.to_string(),
                id,
            }),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
