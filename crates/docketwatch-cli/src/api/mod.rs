//! HTTP trigger surface, mounted under `/api`.

mod auth;
mod endpoints;
mod error;
mod router;
mod server;

pub use router::router;
pub use server::{ApiServer, start_server};

use std::sync::Arc;

use crate::wiring::App;

/// Shared state for handlers and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub app: App,
    /// Required `X-Api-Key` value, if any.
    pub api_key: Option<Arc<str>>,
}

impl ApiContext {
    pub fn new(app: App, api_key: Option<String>) -> Self {
        Self {
            app,
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .map(Arc::from),
        }
    }
}
