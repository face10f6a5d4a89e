//! HTTP handlers for the generic CRUD operations.

pub mod crud;
pub use crud::{
    allow_access, allow_edit, default_query_all, plain_in_filter, AccessHook, CommitHook, CrudHooks,
    CrudOps, EditHook, InFilterHook, ListHook,
};
