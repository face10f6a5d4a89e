//! Common routes: health, readiness, version. All public.

use super::{handler_fn, HttpMethod, Route};
use crate::auth::Rights;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    store: &'static str,
}

/// GET /health, GET /ready (store ping), GET /version.
pub fn common_routes() -> Vec<Route> {
    vec![
        Route::new(
            "Health",
            HttpMethod::Get,
            "/health",
            Rights::NONE,
            handler_fn(|_, _| async { Json(HealthBody { status: "ok" }).into_response() }),
        ),
        Route::new(
            "Ready",
            HttpMethod::Get,
            "/ready",
            Rights::NONE,
            handler_fn(|ctx, _| async move {
                match ctx.store.ping().await {
                    Ok(()) => Json(ReadyBody {
                        status: "ok",
                        store: "ok",
                    })
                    .into_response(),
                    Err(e) => {
                        tracing::warn!(error = %e, "store unavailable");
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            Json(ReadyBody {
                                status: "degraded",
                                store: "unavailable",
                            }),
                        )
                            .into_response()
                    }
                }
            }),
        ),
        Route::new(
            "Version",
            HttpMethod::Get,
            "/version",
            Rights::NONE,
            handler_fn(|_, _| async {
                Json(serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }))
                .into_response()
            }),
        ),
    ]
}
