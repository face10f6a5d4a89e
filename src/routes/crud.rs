//! Synthesizes the five canonical routes for a resource type.

use super::{HttpMethod, Route};
use crate::auth::Rights;
use crate::context::RequestContext;
use crate::error::ConfigError;
use crate::handlers::crud::{CrudHooks, CrudOps};
use crate::query::ListQuery;
use crate::resource::Resource;
use std::sync::Arc;

fn url_safe(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// First letter upper-cased.
fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builder for the list / get / create / update / delete routes of `R`.
///
/// Every operation starts public with an allow-all hook.
pub struct CrudRoutes<R: Resource> {
    hooks: CrudHooks<R>,
    list_rights: Rights,
    get_rights: Rights,
    create_rights: Rights,
    update_rights: Rights,
    delete_rights: Rights,
    prefix: String,
}

impl<R: Resource> Default for CrudRoutes<R> {
    fn default() -> Self {
        CrudRoutes {
            hooks: CrudHooks::default(),
            list_rights: Rights::NONE,
            get_rights: Rights::NONE,
            create_rights: Rights::NONE,
            update_rights: Rights::NONE,
            delete_rights: Rights::NONE,
            prefix: String::new(),
        }
    }
}

impl<R: Resource> CrudRoutes<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list<F>(mut self, rights: Rights, hook: F) -> Self
    where
        F: Fn(&RequestContext, ListQuery) -> ListQuery + Send + Sync + 'static,
    {
        self.list_rights = rights;
        self.hooks.list = Arc::new(hook);
        self
    }

    pub fn get<F>(mut self, rights: Rights, hook: F) -> Self
    where
        F: Fn(&RequestContext, &R) -> bool + Send + Sync + 'static,
    {
        self.get_rights = rights;
        self.hooks.get = Arc::new(hook);
        self
    }

    pub fn create<F>(mut self, rights: Rights, hook: F) -> Self
    where
        F: Fn(&RequestContext, &R) -> bool + Send + Sync + 'static,
    {
        self.create_rights = rights;
        self.hooks.create = Arc::new(hook);
        self
    }

    /// Called with the stored record after every successful create.
    pub fn after_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &R) + Send + Sync + 'static,
    {
        self.hooks.after_create = Some(Arc::new(hook));
        self
    }

    /// `hook` receives the stored record, then the incoming one.
    pub fn update<F>(mut self, rights: Rights, hook: F) -> Self
    where
        F: Fn(&RequestContext, &R, &R) -> bool + Send + Sync + 'static,
    {
        self.update_rights = rights;
        self.hooks.update = Arc::new(hook);
        self
    }

    pub fn delete<F>(mut self, rights: Rights, hook: F) -> Self
    where
        F: Fn(&RequestContext, &R) -> bool + Send + Sync + 'static,
    {
        self.delete_rights = rights;
        self.hooks.delete = Arc::new(hook);
        self
    }

    /// Replace how `In` filters restrict the list query; the hook sees the request's caller.
    pub fn in_filter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, ListQuery, &str, &[String]) -> ListQuery + Send + Sync + 'static,
    {
        self.hooks.in_filter = Arc::new(hook);
        self
    }

    /// Mount under `/api/<prefix>/<table>`; the prefix's first segment joins the route names.
    pub fn under(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<Vec<Route>, ConfigError> {
        let table = R::table_name();
        if table.is_empty() || !url_safe(table) {
            return Err(ConfigError::InvalidTableName(table.to_string()));
        }
        let prefix = self.prefix.trim_matches('/');
        if !prefix.split('/').all(url_safe) {
            return Err(ConfigError::InvalidPattern {
                name: table.to_string(),
                pattern: self.prefix.clone(),
            });
        }
        let parent = prefix.split('/').next().unwrap_or_default();
        let suffix = format!("{}{}", parent, title(table));
        let collection = if prefix.is_empty() {
            format!("/api/{}", table)
        } else {
            format!("/api/{}/{}", prefix, table)
        };
        let item = format!("{}/{{id}}", collection);

        let ops = Arc::new(CrudOps::new(self.hooks));
        Ok(vec![
            Route::new(
                format!("GetAll{}", suffix),
                HttpMethod::Get,
                collection.clone(),
                self.list_rights,
                ops.list_handler(),
            ),
            Route::new(
                format!("Get{}", suffix),
                HttpMethod::Get,
                item.clone(),
                self.get_rights,
                ops.get_handler(),
            ),
            Route::new(
                format!("Create{}", suffix),
                HttpMethod::Post,
                collection,
                self.create_rights,
                ops.create_handler(),
            ),
            Route::new(
                format!("Update{}", suffix),
                HttpMethod::Put,
                item.clone(),
                self.update_rights,
                ops.update_handler(),
            ),
            Route::new(
                format!("Delete{}", suffix),
                HttpMethod::Delete,
                item,
                self.delete_rights,
                ops.delete_handler(),
            ),
        ])
    }
}
