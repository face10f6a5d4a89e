//! Named routes, the CRUD route synthesizer and the frozen registry mounted on axum.

mod common;
mod crud;
mod registry;

pub use common::common_routes;
pub use crud::CrudRoutes;
pub use registry::{RegistryBuilder, RouteRegistry, ROUTE_LISTING_NAME};

use crate::auth::Rights;
use crate::context::RequestContext;
use axum::body::Bytes;
use axum::response::Response;
use axum::routing::MethodFilter;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;
/// Type-erased route handler: typed request context plus raw body in, response out.
pub type Handler = Arc<dyn Fn(RequestContext, Bytes) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, body: Bytes| -> HandlerFuture { Box::pin(f(ctx, body)) })
}

/// A named endpoint. `pattern` uses `{id}` for the numeric record id.
#[derive(Clone)]
pub struct Route {
    pub name: String,
    pub method: HttpMethod,
    pub pattern: String,
    pub rights: Rights,
    pub handler: Handler,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        method: HttpMethod,
        pattern: impl Into<String>,
        rights: Rights,
        handler: Handler,
    ) -> Self {
        Route {
            name: name.into(),
            method,
            pattern: pattern.into(),
            rights,
            handler,
        }
    }

    pub fn has_id(&self) -> bool {
        self.pattern.split('/').any(|s| s == "{id}")
    }

    /// axum 0.7 path syntax.
    pub(crate) fn axum_path(&self) -> String {
        self.pattern.replace("{id}", ":id")
    }

    pub fn view(&self) -> RouteView {
        RouteView {
            name: self.name.clone(),
            method: self.method,
            pattern: self.pattern.clone(),
            auth: self.rights,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("rights", &self.rights)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a route, as returned by the route listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteView {
    pub name: String,
    pub method: HttpMethod,
    pub pattern: String,
    pub auth: Rights,
}
