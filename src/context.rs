//! Typed per-request context handed to handlers, contract methods and hooks.

use crate::auth::Caller;
use crate::query::QueryParams;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct RequestContext {
    /// Set by the gate when the route required rights and the token verified.
    pub caller: Option<Caller>,
    /// Numeric `{id}` from by-id routes.
    pub id: Option<u64>,
    pub query: QueryParams,
    pub store: Arc<dyn Store>,
}

impl RequestContext {
    pub fn new(store: Arc<dyn Store>) -> Self {
        RequestContext {
            caller: None,
            id: None,
            query: QueryParams::new(),
            store,
        }
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn user_id(&self) -> Option<u64> {
        self.caller.map(|c| c.user_id)
    }
}
