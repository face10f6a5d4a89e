//! Whitelist-driven filter builder: only fields the type author lists are reachable from client input.

use super::{ListQuery, Predicate};
use crate::context::RequestContext;
use serde::{Deserialize, Serialize};

/// Control parameters consumed by paging and ordering, never treated as filters.
pub const RESERVED_PARAMS: [&str; 3] = ["page", "pagesize", "order"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    In,
    Substring,
    Year,
    /// Return only the distinct values of the field.
    Distinct,
}

/// Apply every whitelisted filter present in the request's query string to `query`.
///
/// `in_filter` builds the restriction for `FilterOp::In` entries so a deployment can
/// rewrite it per key and per caller; `handlers::plain_in_filter` is the plain behaviour.
pub fn apply_filters<F>(
    mut query: ListQuery,
    ctx: &RequestContext,
    whitelist: &[(&str, FilterOp)],
    in_filter: F,
) -> ListQuery
where
    F: Fn(&RequestContext, ListQuery, &str, &[String]) -> ListQuery,
{
    let mut params = ctx.query.clone();
    for key in RESERVED_PARAMS {
        params.remove(key);
    }
    if params.is_empty() {
        return query;
    }

    for (field, op) in whitelist {
        let Some(values) = params.get(field) else { continue };
        let Some(first) = values.first() else { continue };
        query = match op {
            FilterOp::Equals => query.filter(Predicate::equals(*field, first.clone())),
            FilterOp::In => in_filter(ctx, query, *field, values),
            FilterOp::Substring => query.filter(Predicate::Like {
                field: (*field).to_string(),
                pattern: format!("%{}%", first),
            }),
            FilterOp::Year => query.filter(Predicate::Year {
                field: (*field).to_string(),
                year: first.clone(),
            }),
            FilterOp::Distinct => {
                query.distinct = Some((*field).to_string());
                query
            }
        };
    }
    query
}
