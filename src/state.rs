//! Shared application state handed to the router: the store and the token verifier.

use crate::auth::TokenVerifier;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(store: impl Store + 'static, verifier: impl TokenVerifier + 'static) -> Self {
        AppState {
            store: Arc::new(store),
            verifier: Arc::new(verifier),
        }
    }
}
