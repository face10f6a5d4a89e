//! Append-only route registry, frozen before serving and mounted on an axum router.

use super::{handler_fn, HttpMethod, Route, RouteView};
use crate::auth::{gate, Caller, GateState, Rights};
use crate::context::RequestContext;
use crate::error::{AppError, ConfigError};
use crate::query::QueryParams;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, Request},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{on, MethodRouter},
    Extension, Json, Router,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const ROUTE_LISTING_NAME: &str = "GetAllRoutes";
const ROUTE_LISTING_PATTERN: &str = "/api/routes";

#[derive(Serialize)]
struct RouteListing {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<RouteView>>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    routes: Vec<Route>,
    names: HashSet<String>,
    endpoints: HashSet<(HttpMethod, String)>,
    listing: Option<bool>,
}

fn valid_pattern(pattern: &str) -> bool {
    pattern.starts_with('/')
        && pattern.split('/').skip(1).all(|seg| {
            seg == "{id}"
                || seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        })
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one route. Names and method/pattern pairs must be unique.
    pub fn route(mut self, route: Route) -> Result<Self, ConfigError> {
        if !valid_pattern(&route.pattern) {
            return Err(ConfigError::InvalidPattern {
                name: route.name,
                pattern: route.pattern,
            });
        }
        if !self.names.insert(route.name.clone()) {
            return Err(ConfigError::DuplicateRoute(route.name));
        }
        if !self.endpoints.insert((route.method, route.pattern.clone())) {
            return Err(ConfigError::DuplicateRoute(format!("{} {}", route.method, route.pattern)));
        }
        self.routes.push(route);
        Ok(self)
    }

    pub fn routes(self, routes: impl IntoIterator<Item = Route>) -> Result<Self, ConfigError> {
        routes.into_iter().try_fold(self, RegistryBuilder::route)
    }

    /// Add the public `GET /api/routes` listing. With `expose == false` it answers without the table.
    pub fn with_route_listing(mut self, expose: bool) -> Self {
        self.listing = Some(expose);
        self
    }

    pub fn build(self) -> Result<Arc<RouteRegistry>, ConfigError> {
        let Some(expose) = self.listing else {
            return Ok(Arc::new(RouteRegistry::new(self.routes)));
        };
        let placeholder = handler_fn(|_, _| async { AppError::NotFound.into_response() });
        let mut listing = Route::new(
            ROUTE_LISTING_NAME,
            HttpMethod::Get,
            ROUTE_LISTING_PATTERN,
            Rights::NONE,
            placeholder,
        );
        let mut builder = self.route(listing.clone())?;
        builder.routes.pop();

        let views = Arc::new(builder.routes.iter().chain([&listing]).map(Route::view).collect::<Vec<_>>());
        listing.handler = handler_fn(move |_, _| {
            let data = expose.then(|| views.as_ref().clone());
            async move {
                Json(RouteListing {
                    success: true,
                    message: "All Routes",
                    data,
                })
                .into_response()
            }
        });
        builder.routes.push(listing);
        Ok(Arc::new(RouteRegistry::new(builder.routes)))
    }
}

/// Frozen set of routes, shared read-only by every request.
pub struct RouteRegistry {
    routes: Vec<Route>,
    by_name: HashMap<String, usize>,
}

impl RouteRegistry {
    fn new(routes: Vec<Route>) -> Self {
        let by_name = routes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        RouteRegistry { routes, by_name }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.by_name.get(name).map(|&i| &self.routes[i])
    }

    /// Rights fixed on the named route at registration.
    pub fn rights_of(&self, name: &str) -> Option<Rights> {
        self.get(name).map(|r| r.rights)
    }

    pub fn views(&self) -> Vec<RouteView> {
        self.routes.iter().map(Route::view).collect()
    }

    /// Mount every route, each behind the gate for its own name.
    pub fn into_router(self: &Arc<Self>, state: AppState) -> Router {
        let mut by_path: BTreeMap<String, (bool, MethodRouter)> = BTreeMap::new();
        for route in &self.routes {
            let gate_state = GateState {
                route_name: Arc::from(route.name.as_str()),
                registry: self.clone(),
                verifier: state.verifier.clone(),
            };
            let handler = route.handler.clone();
            let store = state.store.clone();
            let endpoint = on(
                route.method.filter(),
                move |path: Option<Path<HashMap<String, String>>>,
                      caller: Option<Extension<Caller>>,
                      RawQuery(raw): RawQuery,
                      body: Bytes| async move {
                    let mut ctx = RequestContext::new(store)
                        .with_query(raw.as_deref().map(QueryParams::parse).unwrap_or_default());
                    if let Some(Extension(caller)) = caller {
                        ctx = ctx.with_caller(caller);
                    }
                    if let Some(id) = path.and_then(|Path(p)| p.get("id").and_then(|v| v.parse().ok())) {
                        ctx = ctx.with_id(id);
                    }
                    handler(ctx, body).await
                },
            )
            .layer(from_fn_with_state(gate_state, gate));

            let path = route.axum_path();
            let methods = match by_path.remove(&path) {
                Some((_, methods)) => methods.merge(endpoint),
                None => endpoint,
            };
            by_path.insert(path, (route.has_id(), methods));
        }

        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, (has_id, methods))| {
                let methods = if has_id {
                    methods.layer(from_fn(require_numeric_id))
                } else {
                    methods
                };
                router.route(&path, methods)
            })
    }
}

/// `{id}` must be decimal digits that fit a `u64`; anything else is 404 before the gate.
async fn require_numeric_id(
    path: Option<Path<HashMap<String, String>>>,
    request: Request,
    next: Next,
) -> Response {
    let numeric = path
        .as_ref()
        .and_then(|Path(p)| p.get("id"))
        .map(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && id.parse::<u64>().is_ok())
        .unwrap_or(false);
    if !numeric {
        return AppError::NotFound.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str, method: HttpMethod, pattern: &str, rights: u32) -> Route {
        Route::new(
            name,
            method,
            pattern,
            Rights(rights),
            handler_fn(|_, _| async { ().into_response() }),
        )
    }

    #[test]
    fn rights_are_looked_up_by_name() {
        let registry = RegistryBuilder::new()
            .route(noop("GetAllThings", HttpMethod::Get, "/api/things", 3))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(registry.rights_of("GetAllThings"), Some(Rights(3)));
        assert_eq!(registry.rights_of("Nope"), None);
    }

    #[test]
    fn duplicates_are_rejected() {
        let builder = RegistryBuilder::new()
            .route(noop("A", HttpMethod::Get, "/a", 0))
            .unwrap();
        assert!(matches!(
            builder.route(noop("A", HttpMethod::Post, "/a", 0)),
            Err(ConfigError::DuplicateRoute(_))
        ));
        let builder = RegistryBuilder::new()
            .route(noop("A", HttpMethod::Get, "/a", 0))
            .unwrap();
        assert!(matches!(
            builder.route(noop("B", HttpMethod::Get, "/a", 0)),
            Err(ConfigError::DuplicateRoute(_))
        ));
    }

    #[test]
    fn patterns_are_checked() {
        assert!(valid_pattern("/api/things/{id}"));
        assert!(!valid_pattern("api/things"));
        assert!(!valid_pattern("/api/{other}"));
    }

    #[test]
    fn listing_is_registered_last() {
        let registry = RegistryBuilder::new()
            .route(noop("A", HttpMethod::Get, "/a", 0))
            .unwrap()
            .with_route_listing(true)
            .build()
            .unwrap();
        let names: Vec<String> = registry.views().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["A".to_string(), ROUTE_LISTING_NAME.to_string()]);
    }
}
