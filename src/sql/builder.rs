//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from list-query fragments.
//! Every statement returns rows as one `jsonb` column named `row`.

use super::PgBindValue;
use crate::query::{ListQuery, OrderBy, Predicate};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from type-author whitelists).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    fn text_param(&mut self, s: &str) -> String {
        format!("${}", self.push_param(PgBindValue::Text(s.to_string())))
    }
}

/// WHERE clause for `predicates`; values are compared in their text form.
fn where_clause(q: &mut QueryBuf, predicates: &[Predicate]) -> String {
    let mut parts = Vec::with_capacity(predicates.len());
    for p in predicates {
        let col = quoted(p.field());
        let part = match p {
            Predicate::Equals { value, .. } => format!("{}::text = {}", col, q.text_param(value)),
            Predicate::In { values, .. } if values.is_empty() => "FALSE".to_string(),
            Predicate::In { values, .. } => {
                let placeholders: Vec<String> = values.iter().map(|v| q.text_param(v)).collect();
                format!("{}::text IN ({})", col, placeholders.join(", "))
            }
            Predicate::Like { pattern, .. } => format!("{}::text LIKE {}", col, q.text_param(pattern)),
            Predicate::Year { year, .. } => format!("to_char({}, 'YYYY') = {}", col, q.text_param(year)),
        };
        parts.push(part);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(order: &OrderBy) -> String {
    let col = quoted(&order.field);
    let dir = order.direction.as_sql();
    if order.numeric_first {
        format!(
            " ORDER BY CASE WHEN {c}::text ~ '^-?[0-9]+(\\.[0-9]+)?$' THEN ({c}::text)::numeric END {d}, {c} {d}",
            c = col,
            d = dir
        )
    } else {
        format!(" ORDER BY {} {}", col, dir)
    }
}

fn page_clause(query: &ListQuery) -> String {
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = if query.offset > 0 {
        format!(" OFFSET {}", query.offset)
    } else {
        String::new()
    };
    format!("{}{}", limit, offset)
}

/// SELECT page of rows. With `distinct`, rows are `{field: value}` for each distinct value.
pub fn select_list(schema: &str, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &query.table);
    let where_sql = where_clause(&mut q, &query.predicates);
    q.sql = match &query.distinct {
        Some(field) => {
            // Only the projected column may be ordered on.
            let order_sql = query
                .order
                .as_ref()
                .filter(|o| o.field == *field)
                .map(order_clause)
                .unwrap_or_default();
            format!(
                "SELECT jsonb_build_object('{}', {}) AS row FROM {} AS main{} GROUP BY {}{}{}",
                field.replace('\'', "''"),
                quoted(field),
                table,
                where_sql,
                quoted(field),
                order_sql,
                page_clause(query)
            )
        }
        None => format!(
            "SELECT to_jsonb(main) AS row FROM {} AS main{}{}{}",
            table,
            where_sql,
            query.order.as_ref().map(order_clause).unwrap_or_default(),
            page_clause(query)
        ),
    };
    q
}

/// COUNT of rows (or distinct values) matching the query's predicates.
///
/// Distinct counts are taken over the same `GROUP BY` as `select_list`, so a NULL group counts.
pub fn count(schema: &str, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &query.table);
    let where_sql = where_clause(&mut q, &query.predicates);
    q.sql = match &query.distinct {
        Some(field) => format!(
            "SELECT COUNT(*) FROM (SELECT 1 FROM {}{} GROUP BY {}) AS groups",
            table,
            where_sql,
            quoted(field)
        ),
        None => format!("SELECT COUNT(*) FROM {}{}", table, where_sql),
    };
    q
}

/// SELECT by primary key.
pub fn select_by_id(schema: &str, table: &str, pk: &str, id: u64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::id(id));
    q.sql = format!(
        "SELECT to_jsonb(main) AS row FROM {} AS main WHERE {} = ${}",
        qualified_table(schema, table),
        quoted(pk),
        n
    );
    q
}

/// INSERT the object's fields; column types come from the table via `jsonb_populate_record`.
/// An unassigned primary key is left out so the column default applies.
pub fn insert(schema: &str, table: &str, pk: &str, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, table);
    let cols: Vec<String> = row
        .iter()
        .filter(|(k, v)| !(k.as_str() == pk && crate::store::is_unassigned(Some(v))))
        .map(|(k, _)| quoted(k))
        .collect();
    if cols.is_empty() {
        q.sql = format!("INSERT INTO {} AS main DEFAULT VALUES RETURNING to_jsonb(main) AS row", table);
        return q;
    }
    let n = q.push_param(PgBindValue::Json(Value::Object(row.clone())));
    let col_list = cols.join(", ");
    q.sql = format!(
        "INSERT INTO {t} AS main ({c}) SELECT {c} FROM jsonb_populate_record(NULL::{t}, ${n}) RETURNING to_jsonb(main) AS row",
        t = table,
        c = col_list,
        n = n
    );
    q
}

/// UPDATE by id: SET every field of `row` except the primary key.
pub fn update(schema: &str, table: &str, pk: &str, id: u64, row: &Map<String, Value>) -> QueryBuf {
    let cols: Vec<String> = row.keys().filter(|k| k.as_str() != pk).map(|k| quoted(k)).collect();
    if cols.is_empty() {
        return select_by_id(schema, table, pk, id);
    }
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, table);
    let row_param = q.push_param(PgBindValue::Json(Value::Object(row.clone())));
    let id_param = q.push_param(PgBindValue::id(id));
    let col_list = cols.join(", ");
    q.sql = format!(
        "UPDATE {t} AS main SET ({c}) = (SELECT {c} FROM jsonb_populate_record(NULL::{t}, ${r})) WHERE main.{pk} = ${i} RETURNING to_jsonb(main) AS row",
        t = table,
        c = col_list,
        r = row_param,
        pk = quoted(pk),
        i = id_param
    );
    q
}

/// DELETE by id.
pub fn delete(schema: &str, table: &str, pk: &str, id: u64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::id(id));
    q.sql = format!("DELETE FROM {} WHERE {} = ${}", qualified_table(schema, table), quoted(pk), n);
    q
}
