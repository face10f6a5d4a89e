//! Structured list-query fragments handed to the persistence collaborator.
//! Identifiers come from type-author whitelists only; client text is always a bound value.

mod filter;
mod order;
mod paging;

pub use filter::{apply_filters, FilterOp, RESERVED_PARAMS};
pub use order::{resolve_order, Direction, OrderBy};
pub use paging::{Paging, PagingError, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

use serde::Serialize;

/// Query-string pairs in arrival order; repeated keys keep every value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `a=1&b=2&a=3` query string (percent-decoding included).
    pub fn parse(raw: &str) -> Self {
        url::form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First value for `key`, like a form lookup.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

/// One restriction on a list query. Values are compared in their text form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Equals { field: String, value: String },
    In { field: String, values: Vec<String> },
    /// SQL `LIKE` pattern, `%` wildcards already applied.
    Like { field: String, pattern: String },
    Year { field: String, year: String },
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<String>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::In { field, .. }
            | Predicate::Like { field, .. }
            | Predicate::Year { field, .. } => field,
        }
    }
}

/// Accumulated list query for one table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub table: String,
    pub predicates: Vec<Predicate>,
    pub order: Option<OrderBy>,
    /// Project to the distinct values of this field instead of whole rows.
    pub distinct: Option<String>,
    pub offset: i64,
    /// `None` for counts; list fetches always carry a bound.
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn new(table: impl Into<String>) -> Self {
        ListQuery {
            table: table.into(),
            predicates: Vec::new(),
            order: None,
            distinct: None,
            offset: 0,
            limit: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn page(mut self, paging: &Paging) -> Self {
        self.offset = paging.offset();
        self.limit = Some(paging.page_size);
        self
    }
}
