//! CRUD API SDK: generic REST endpoints over relational tables for any type implementing [`Resource`].
//!
//! A type describes its table, validation, filter and order whitelists and mergeable fields;
//! [`CrudRoutes`] synthesizes its five routes, [`RegistryBuilder`] freezes them with their
//! rights bitmasks, and [`build_app`] mounts them behind the authorization gate.

pub mod app;
pub mod auth;
pub mod context;
pub mod error;
pub mod handlers;
pub mod history;
pub mod query;
pub mod resource;
pub mod response;
pub mod routes;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use app::{build_app, init_tracing};
pub use auth::{Caller, JwtVerifier, Rights, TokenVerifier};
pub use context::RequestContext;
pub use error::{AppError, AuthError, ConfigError, StoreError};
pub use handlers::{allow_access, allow_edit, default_query_all, plain_in_filter};
pub use history::{ChangeRecord, FieldValue, IntoFieldValue, MergeField, Named};
pub use query::{FilterOp, ListQuery, Predicate, QueryParams};
pub use resource::{Resource, ValidationDetails};
pub use response::{acknowledged, success_many, success_one};
pub use routes::{common_routes, handler_fn, CrudRoutes, HttpMethod, RegistryBuilder, Route, RouteRegistry};
pub use settings::Settings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};

/// Re-exported for `#[async_trait]` on [`Resource`] impls that override `locate`.
pub use async_trait::async_trait;
