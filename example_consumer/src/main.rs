//! Example consumer: a notes API built on crud-api-sdk.
//!
//! Run from repo root: `cargo run -p example-consumer`
//!
//! Without `DATABASE_URL` the in-process store is used. With PostgreSQL, create the table first:
//!
//! ```sql
//! CREATE TABLE notes (
//!     id BIGSERIAL PRIMARY KEY,
//!     title TEXT NOT NULL,
//!     body TEXT NOT NULL DEFAULT '',
//!     reference TEXT NOT NULL DEFAULT '',
//!     pinned BOOLEAN NOT NULL DEFAULT FALSE,
//!     due_date DATE,
//!     owner_id BIGINT NOT NULL DEFAULT 0,
//!     labels JSONB NOT NULL DEFAULT '[]',
//!     history JSONB NOT NULL DEFAULT '[]'
//! );
//! ```

use chrono::NaiveDate;
use crud_api_sdk::{
    allow_access, build_app, common_routes, init_tracing, merge_field, AppState, ChangeRecord,
    ConfigError, CrudRoutes, FilterOp, JwtVerifier, ListQuery, MemoryStore, MergeField, Named,
    PgStore, Predicate, RegistryBuilder, RequestContext, Resource, Rights, Route, Settings,
    ValidationDetails,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

const READ: Rights = Rights::bit(0);
const WRITE: Rights = Rights::bit(1);
const ADMIN: Rights = Rights::bit(2);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Label {
    name: Option<String>,
}

impl Named for Label {
    fn display_name(&self) -> Option<String> {
        self.name.clone()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Note {
    id: u64,
    title: String,
    body: String,
    reference: String,
    pinned: bool,
    due_date: Option<NaiveDate>,
    owner_id: u64,
    labels: Vec<Label>,
    /// Last update's changes; written by the handler, never read from the client.
    #[serde(skip_deserializing)]
    history: Vec<ChangeRecord>,
}

impl Resource for Note {
    const TRACKS_HISTORY: bool = true;

    fn table_name() -> &'static str {
        "notes"
    }

    fn validate(&self) -> Result<(), ValidationDetails> {
        let mut errors = serde_json::Map::new();
        if self.title.trim().is_empty() {
            errors.insert("title".into(), json!("must not be empty"));
        }
        if self.title.len() > 200 {
            errors.insert("title".into(), json!("at most 200 characters"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(json!({"success": false, "message": "invalid note", "errors": errors}))
        }
    }

    fn orderable_fields() -> &'static [&'static str] {
        &["reference", "title", "due_date", "owner_id"]
    }

    fn filterable_fields() -> &'static [(&'static str, FilterOp)] {
        &[
            ("title", FilterOp::Substring),
            ("pinned", FilterOp::Equals),
            ("reference", FilterOp::In),
            ("due_date", FilterOp::Year),
            ("owner_id", FilterOp::Distinct),
        ]
    }

    fn stamp_caller(&mut self, user_id: u64) {
        self.owner_id = user_id;
    }

    fn merge_fields() -> Vec<MergeField<Self>> {
        vec![
            merge_field!(Note, title, "Titre"),
            merge_field!(Note, body, "Contenu"),
            merge_field!(Note, reference, "Référence"),
            merge_field!(Note, pinned, "Epinglée"),
            merge_field!(Note, due_date, "Echéance"),
            merge_field!(Note, labels, "Etiquettes"),
            merge_field!(Note, owner_id),
        ]
    }

    fn set_history(&mut self, changes: Vec<ChangeRecord>) {
        self.history = changes;
    }
}

fn is_admin(ctx: &RequestContext) -> bool {
    ctx.caller.map_or(false, |c| c.rights.contains(ADMIN))
}

/// Non-admin callers only see their own notes.
fn own_notes(ctx: &RequestContext, query: ListQuery) -> ListQuery {
    match ctx.caller {
        Some(caller) if !is_admin(ctx) => query.filter(Predicate::equals("owner_id", caller.user_id.to_string())),
        _ => query,
    }
}

fn owner_or_admin(ctx: &RequestContext, note: &Note) -> bool {
    is_admin(ctx) || ctx.user_id() == Some(note.owner_id)
}

fn note_routes() -> Result<Vec<Route>, ConfigError> {
    CrudRoutes::<Note>::new()
        .list(READ, own_notes)
        .get(READ, owner_or_admin)
        .create(WRITE, allow_access)
        .after_create(|_, note: &Note| tracing::info!(id = note.id, owner_id = note.owner_id, "note created"))
        .update(WRITE, |ctx: &RequestContext, current: &Note, _incoming: &Note| owner_or_admin(ctx, current))
        .delete(WRITE | ADMIN, owner_or_admin)
        // `?reference=a,b` works like `?reference=a&reference=b`; admins may pass `*` to skip it.
        .in_filter(|ctx: &RequestContext, query: ListQuery, field: &str, values: &[String]| {
            if is_admin(ctx) && values.iter().any(|v| v == "*") {
                return query;
            }
            let values = values
                .iter()
                .flat_map(|v| v.split(','))
                .map(str::to_string)
                .collect();
            query.filter(Predicate::is_in(field, values))
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_tracing("crud_api_sdk=info,example_consumer=info,tower_http=info");

    let registry = RegistryBuilder::new()
        .routes(note_routes()?)?
        .routes(common_routes())?
        .with_route_listing(!settings.is_production())
        .build()?;

    let verifier = JwtVerifier::new(&settings.token_password);
    let state = match &settings.database_url {
        Some(url) => {
            let store = PgStore::connect(url, settings.max_connections)
                .await?
                .with_schema(settings.database_schema.clone());
            AppState::new(store, verifier)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; notes live in memory only");
            AppState::new(MemoryStore::new(), verifier)
        }
    };

    let app = build_app(&registry, state, settings.max_body_bytes);
    let listener = TcpListener::bind(("0.0.0.0", settings.port)).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
