//! Capability contract a record type implements to get the five CRUD endpoints.

use crate::context::RequestContext;
use crate::error::AppError;
use crate::history::{ChangeRecord, MergeField};
use crate::query::{FilterOp, ListQuery};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Type-defined validation payload, returned verbatim with status 406.
pub type ValidationDetails = serde_json::Value;

#[async_trait]
pub trait Resource: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Record field-level changes on update and hand them to [`Resource::set_history`].
    const TRACKS_HISTORY: bool = false;

    /// Storage table and URL segment; must match `[A-Za-z0-9_-]+`.
    fn table_name() -> &'static str;

    fn validate(&self) -> Result<(), ValidationDetails>;

    /// Fields the `order` parameter may name, in match order.
    fn orderable_fields() -> &'static [&'static str] {
        &[]
    }

    /// Fields reachable from query-string filters, in application order.
    fn filterable_fields() -> &'static [(&'static str, FilterOp)] {
        &[]
    }

    fn primary_key() -> &'static str {
        "id"
    }

    /// Load the record with `id` into `self`.
    async fn locate(&mut self, ctx: &RequestContext, id: u64) -> Result<(), AppError> {
        let row = ctx
            .store
            .find_by_id(Self::table_name(), Self::primary_key(), id)
            .await?
            .ok_or(AppError::NotFound)?;
        *self = serde_json::from_value(row).map_err(crate::error::StoreError::from)?;
        Ok(())
    }

    /// Narrow the list query for this caller. Must be side-effect free.
    fn narrow_list_query(&self, _ctx: &RequestContext, query: ListQuery) -> ListQuery {
        query
    }

    /// Attribute the record to the calling user.
    fn stamp_caller(&mut self, _user_id: u64) {}

    /// Ordered mergeable fields, see [`crate::merge_field!`].
    fn merge_fields() -> Vec<MergeField<Self>>;

    fn set_history(&mut self, _changes: Vec<ChangeRecord>) {}
}
