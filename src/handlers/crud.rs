//! Generic list / get / create / update / delete over any [`Resource`].

use crate::context::RequestContext;
use crate::error::{AppError, StoreError};
use crate::history::{merge, MergeField};
use crate::query::{apply_filters, resolve_order, ListQuery, Paging, Predicate};
use crate::resource::Resource;
use crate::response::{acknowledged, success_many, success_one};
use crate::routes::{handler_fn, Handler};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::sync::Arc;

/// Rewrites the list query before filters apply (e.g. restrict to the caller's rows).
pub type ListHook = Arc<dyn Fn(&RequestContext, ListQuery) -> ListQuery + Send + Sync>;
/// Per-record permission check for get, create and delete.
pub type AccessHook<R> = Arc<dyn Fn(&RequestContext, &R) -> bool + Send + Sync>;
/// Update permission check, given the stored record and the incoming one.
pub type EditHook<R> = Arc<dyn Fn(&RequestContext, &R, &R) -> bool + Send + Sync>;
/// Runs after a successful create; its outcome never changes the response.
pub type CommitHook<R> = Arc<dyn Fn(&RequestContext, &R) + Send + Sync>;
/// Builds the restriction for an `In` filter key.
pub type InFilterHook = Arc<dyn Fn(&RequestContext, ListQuery, &str, &[String]) -> ListQuery + Send + Sync>;

pub fn default_query_all(_ctx: &RequestContext, query: ListQuery) -> ListQuery {
    query
}

pub fn allow_access<R>(_ctx: &RequestContext, _record: &R) -> bool {
    true
}

pub fn allow_edit<R>(_ctx: &RequestContext, _current: &R, _incoming: &R) -> bool {
    true
}

pub fn plain_in_filter(_ctx: &RequestContext, query: ListQuery, field: &str, values: &[String]) -> ListQuery {
    query.filter(Predicate::is_in(field, values.to_vec()))
}

#[derive(Clone)]
pub struct CrudHooks<R> {
    pub list: ListHook,
    pub get: AccessHook<R>,
    pub create: AccessHook<R>,
    pub after_create: Option<CommitHook<R>>,
    pub update: EditHook<R>,
    pub delete: AccessHook<R>,
    pub in_filter: InFilterHook,
}

impl<R: Resource> Default for CrudHooks<R> {
    fn default() -> Self {
        CrudHooks {
            list: Arc::new(default_query_all),
            get: Arc::new(allow_access::<R>),
            create: Arc::new(allow_access::<R>),
            after_create: None,
            update: Arc::new(allow_edit::<R>),
            delete: Arc::new(allow_access::<R>),
            in_filter: Arc::new(plain_in_filter),
        }
    }
}

/// The five operations for `R`, with their hooks and the type's merge descriptor.
#[derive(Clone)]
pub struct CrudOps<R> {
    hooks: CrudHooks<R>,
    fields: Arc<[MergeField<R>]>,
}

fn decode<R: Resource>(body: &[u8]) -> Result<R, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::BadPayload(e.to_string()))
}

fn stored<R: Resource>(row: Value) -> Result<R, AppError> {
    Ok(serde_json::from_value(row).map_err(StoreError::from)?)
}

fn row_of<R: Resource>(record: &R) -> Result<Value, AppError> {
    Ok(serde_json::to_value(record).map_err(StoreError::from)?)
}

fn stamp<R: Resource>(ctx: &RequestContext, record: &mut R) {
    if let Some(user_id) = ctx.user_id() {
        record.stamp_caller(user_id);
    }
}

/// A row vanishing between locate and write reads as not found.
fn missing_as_not_found(e: StoreError) -> AppError {
    match e {
        StoreError::Missing { .. } => AppError::NotFound,
        other => AppError::Store(other),
    }
}

impl<R: Resource> CrudOps<R> {
    pub fn new(hooks: CrudHooks<R>) -> Self {
        CrudOps {
            hooks,
            fields: R::merge_fields().into(),
        }
    }

    /// Load `id` into `record`; `Ok(false)` when it does not exist.
    async fn locate(&self, record: &mut R, ctx: &RequestContext, id: u64) -> Result<bool, AppError> {
        match record.locate(ctx, id).await {
            Ok(()) => Ok(true),
            Err(AppError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn list(&self, ctx: &RequestContext) -> Result<Response, AppError> {
        let table = R::table_name();
        let paging = Paging::from_params(&ctx.query).map_err(|e| {
            tracing::warn!(table, error = %e, "rejected paging parameters");
            AppError::Retrieval
        })?;

        let shadow = R::default();
        let mut query = shadow.narrow_list_query(ctx, ListQuery::new(table));
        query = (self.hooks.list)(ctx, query);
        if let Some(order) = resolve_order(ctx.query.first("order"), R::orderable_fields()) {
            query.order = Some(order);
        }
        query = apply_filters(query, ctx, R::filterable_fields(), &*self.hooks.in_filter);

        let retrieval = |e: StoreError| {
            tracing::error!(table, error = %e, "list query failed");
            AppError::Retrieval
        };
        let total = ctx.store.count(&query).await.map_err(retrieval)?;
        let distinct = query.distinct.is_some();
        let rows = ctx.store.fetch(&query.page(&paging)).await.map_err(retrieval)?;

        // Distinct projections carry a single field, so they go out as stored.
        let data = if distinct {
            rows
        } else {
            rows.into_iter()
                .map(|row| stored::<R>(row).and_then(|r| row_of(&r)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    tracing::error!(table, error = %e, "list row decode failed");
                    AppError::Retrieval
                })?
        };
        Ok(success_many(data, total, paging.current_page(), paging.page_size).into_response())
    }

    pub async fn get(&self, ctx: &RequestContext) -> Result<Response, AppError> {
        let id = ctx.id.ok_or(AppError::NotFound)?;
        let mut record = R::default();
        let found = self.locate(&mut record, ctx, id).await?;
        if !(self.hooks.get)(ctx, &record) {
            return Err(AppError::Forbidden);
        }
        if !found {
            return Err(AppError::NotFound);
        }
        Ok(success_one(record).into_response())
    }

    pub async fn create(&self, ctx: &RequestContext, body: &[u8]) -> Result<Response, AppError> {
        let mut record: R = decode(body)?;
        stamp(ctx, &mut record);
        record.validate().map_err(AppError::Validation)?;
        if !(self.hooks.create)(ctx, &record) {
            return Err(AppError::Forbidden);
        }
        stamp(ctx, &mut record);

        let row = ctx
            .store
            .insert(R::table_name(), R::primary_key(), row_of(&record)?)
            .await?;
        let created: R = stored(row)?;
        tracing::debug!(table = R::table_name(), user_id = ?ctx.user_id(), "record created");
        if let Some(after) = &self.hooks.after_create {
            after(ctx, &created);
        }
        Ok(success_one(created).into_response())
    }

    pub async fn update(&self, ctx: &RequestContext, body: &[u8]) -> Result<Response, AppError> {
        let id = ctx.id.ok_or(AppError::NotFound)?;
        let mut current = R::default();
        if !self.locate(&mut current, ctx, id).await? {
            return Err(AppError::NotFound);
        }
        let incoming: R = decode(body)?;

        // Only the candidate carries attribution; the incoming record is diffed as sent.
        let mut candidate = current.clone();
        stamp(ctx, &mut candidate);
        let changes = merge(&mut candidate, &incoming, &self.fields);
        candidate.validate().map_err(AppError::Validation)?;
        if !(self.hooks.update)(ctx, &current, &incoming) {
            return Err(AppError::Forbidden);
        }
        stamp(ctx, &mut candidate);

        let row = ctx
            .store
            .update(R::table_name(), R::primary_key(), id, row_of(&candidate)?)
            .await
            .map_err(missing_as_not_found)?;
        let mut updated: R = stored(row)?;
        if R::TRACKS_HISTORY {
            tracing::debug!(table = R::table_name(), id, changes = changes.len(), "record updated");
            updated.set_history(changes);
        }
        Ok(success_one(updated).into_response())
    }

    pub async fn delete(&self, ctx: &RequestContext) -> Result<Response, AppError> {
        let id = ctx.id.ok_or(AppError::NotFound)?;
        let mut record = R::default();
        let found = self.locate(&mut record, ctx, id).await?;
        stamp(ctx, &mut record);
        if !(self.hooks.delete)(ctx, &record) {
            return Err(AppError::Forbidden);
        }
        if !found {
            return Err(AppError::NotFound);
        }
        ctx.store
            .delete(R::table_name(), R::primary_key(), id)
            .await
            .map_err(missing_as_not_found)?;
        Ok(acknowledged("Deletion successful").into_response())
    }
}

impl<R: Resource> CrudOps<R> {
    pub fn list_handler(self: &Arc<Self>) -> Handler {
        let ops = self.clone();
        handler_fn(move |ctx, _body| {
            let ops = ops.clone();
            async move { ops.list(&ctx).await.into_response() }
        })
    }

    pub fn get_handler(self: &Arc<Self>) -> Handler {
        let ops = self.clone();
        handler_fn(move |ctx, _body| {
            let ops = ops.clone();
            async move { ops.get(&ctx).await.into_response() }
        })
    }

    pub fn create_handler(self: &Arc<Self>) -> Handler {
        let ops = self.clone();
        handler_fn(move |ctx, body| {
            let ops = ops.clone();
            async move { ops.create(&ctx, &body).await.into_response() }
        })
    }

    pub fn update_handler(self: &Arc<Self>) -> Handler {
        let ops = self.clone();
        handler_fn(move |ctx, body| {
            let ops = ops.clone();
            async move { ops.update(&ctx, &body).await.into_response() }
        })
    }

    pub fn delete_handler(self: &Arc<Self>) -> Handler {
        let ops = self.clone();
        handler_fn(move |ctx, _body| {
            let ops = ops.clone();
            async move { ops.delete(&ctx).await.into_response() }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Caller, Rights};
    use crate::history::ChangeRecord;
    use crate::resource::ValidationDetails;
    use crate::store::{MemoryStore, Store};
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Ticket {
        id: u64,
        title: String,
        priority: i64,
        owner_id: u64,
        #[serde(skip_deserializing)]
        history: Vec<ChangeRecord>,
    }

    #[async_trait::async_trait]
    impl Resource for Ticket {
        const TRACKS_HISTORY: bool = true;

        fn table_name() -> &'static str {
            "tickets"
        }

        fn validate(&self) -> Result<(), ValidationDetails> {
            if self.title.is_empty() {
                return Err(json!({"title": "required"}));
            }
            if self.priority > 100 {
                return Err(json!({"priority": "at most 100"}));
            }
            Ok(())
        }

        fn stamp_caller(&mut self, user_id: u64) {
            self.owner_id = user_id;
        }

        fn merge_fields() -> Vec<MergeField<Self>> {
            vec![
                crate::merge_field!(Ticket, title, "Titre"),
                crate::merge_field!(Ticket, priority, "Priorité"),
                crate::merge_field!(Ticket, owner_id, "Auteur"),
            ]
        }

        fn set_history(&mut self, changes: Vec<ChangeRecord>) {
            self.history = changes;
        }
    }

    fn ctx(store: Arc<dyn Store>) -> RequestContext {
        RequestContext::new(store).with_caller(Caller {
            user_id: 9,
            rights: Rights(1),
        })
    }

    async fn body(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn stored_row(store: &Arc<dyn Store>, id: u64) -> Option<Value> {
        store.find_by_id("tickets", "id", id).await.unwrap()
    }

    fn seeded() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new().with_rows(
            "tickets",
            "id",
            vec![json!({"title": "first", "priority": 2, "owner_id": 1})],
        ))
    }

    #[tokio::test]
    async fn create_stamps_caller_and_persists() {
        let store = seeded();
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        let resp = ops
            .create(&ctx(store.clone()), br#"{"title":"second"}"#)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let row = store.find_by_id("tickets", "id", 2).await.unwrap().unwrap();
        assert_eq!(row["owner_id"], 9);
    }

    #[tokio::test]
    async fn create_rejections() {
        let store = seeded();
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        assert!(matches!(
            ops.create(&ctx(store.clone()), b"{not json").await,
            Err(AppError::BadPayload(_))
        ));
        assert!(matches!(
            ops.create(&ctx(store.clone()), b"{}").await,
            Err(AppError::Validation(_))
        ));

        let hooks = CrudHooks::<Ticket> {
            create: Arc::new(|_: &RequestContext, _: &Ticket| false),
            ..Default::default()
        };
        let ops = CrudOps::new(hooks);
        assert!(matches!(
            ops.create(&ctx(store.clone()), br#"{"title":"x"}"#).await,
            Err(AppError::Forbidden)
        ));
        assert_eq!(store.count(&ListQuery::new("tickets")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_merges_only_supplied_fields() {
        let store = seeded();
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        let c = ctx(store.clone()).with_id(1);
        ops.update(&c, br#"{"priority":5}"#).await.unwrap();
        let row = store.find_by_id("tickets", "id", 1).await.unwrap().unwrap();
        assert_eq!(row["title"], "first");
        assert_eq!(row["priority"], 5);
        assert_eq!(row["owner_id"], 9);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let store = seeded();
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        let c = ctx(store).with_id(40);
        assert!(matches!(ops.get(&c).await, Err(AppError::NotFound)));
        assert!(matches!(ops.update(&c, br#"{"priority":1}"#).await, Err(AppError::NotFound)));
        assert!(matches!(ops.delete(&c).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn access_hook_runs_before_not_found() {
        let hooks = CrudHooks::<Ticket> {
            get: Arc::new(|_: &RequestContext, _: &Ticket| false),
            delete: Arc::new(|_: &RequestContext, _: &Ticket| false),
            ..Default::default()
        };
        let ops = CrudOps::new(hooks);
        let c = ctx(seeded()).with_id(40);
        assert!(matches!(ops.get(&c).await, Err(AppError::Forbidden)));
        assert!(matches!(ops.delete(&c).await, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn bad_paging_is_a_retrieval_error() {
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        for raw in ["pagesize=0", "page=9223372036854775807&pagesize=2"] {
            let c = ctx(seeded()).with_query(crate::query::QueryParams::parse(raw));
            assert!(matches!(ops.list(&c).await, Err(AppError::Retrieval)), "{raw}");
        }
    }

    #[tokio::test]
    async fn update_history_leaves_out_caller_attribution() {
        let store = seeded();
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        let resp = ops
            .update(&ctx(store.clone()).with_id(1), br#"{"priority":7}"#)
            .await
            .unwrap();
        let data = &body(resp).await["data"];
        assert_eq!(
            data["history"],
            json!([{"field": "Priorité", "oldValue": "2", "newValue": "7"}])
        );
        assert_eq!(data["owner_id"], 9);
        assert_eq!(stored_row(&store, 1).await.unwrap()["owner_id"], 9);
    }

    #[tokio::test]
    async fn update_rejections_leave_the_row_alone() {
        let store = seeded();
        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        let c = ctx(store.clone()).with_id(1);
        assert!(matches!(
            ops.update(&c, br#"{"priority":500}"#).await,
            Err(AppError::Validation(details)) if details == json!({"priority": "at most 100"})
        ));
        assert!(matches!(ops.update(&c, b"[1,").await, Err(AppError::BadPayload(_))));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let hooks = CrudHooks::<Ticket> {
            update: Arc::new(move |_: &RequestContext, current: &Ticket, incoming: &Ticket| {
                log.lock().unwrap().push((current.owner_id, incoming.priority));
                false
            }),
            ..Default::default()
        };
        let ops = CrudOps::new(hooks);
        assert!(matches!(ops.update(&c, br#"{"priority":3}"#).await, Err(AppError::Forbidden)));
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3)]);

        let row = stored_row(&store, 1).await.unwrap();
        assert_eq!(row["priority"], 2);
        assert_eq!(row["owner_id"], 1);
    }

    #[tokio::test]
    async fn after_create_sees_the_stored_record_once() {
        let store = seeded();
        let created = Arc::new(Mutex::new(Vec::new()));
        let log = created.clone();
        let hooks = CrudHooks::<Ticket> {
            after_create: Some(Arc::new(move |_: &RequestContext, t: &Ticket| {
                log.lock().unwrap().push((t.id, t.owner_id, t.title.clone()));
            })),
            ..Default::default()
        };
        let ops = CrudOps::new(hooks);
        ops.create(&ctx(store.clone()), br#"{"title":"second"}"#)
            .await
            .unwrap();
        assert_eq!(*created.lock().unwrap(), vec![(2, 9, "second".to_string())]);

        // Rejected creates never reach it.
        assert!(ops.create(&ctx(store), b"{}").await.is_err());
        assert_eq!(created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_hook_guards_existing_rows() {
        let store = seeded();
        let hooks = CrudHooks::<Ticket> {
            delete: Arc::new(|_: &RequestContext, t: &Ticket| t.title != "first"),
            ..Default::default()
        };
        let ops = CrudOps::new(hooks);
        let c = ctx(store.clone()).with_id(1);
        assert!(matches!(ops.delete(&c).await, Err(AppError::Forbidden)));
        assert_eq!(stored_row(&store, 1).await.unwrap()["title"], "first");

        let ops = CrudOps::<Ticket>::new(CrudHooks::default());
        let resp = ops.delete(&c).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(stored_row(&store, 1).await.is_none());
        assert!(matches!(ops.delete(&c).await, Err(AppError::NotFound)));
    }
}
