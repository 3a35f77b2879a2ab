//! HTTP API for the dispatcher session

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::session::{SessionFactory, SessionHandle};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The one active session. Replaced on reset.
    pub session: Arc<RwLock<SessionHandle>>,
    pub factory: SessionFactory,
}

impl AppState {
    pub fn new(factory: SessionFactory) -> Self {
        let session = factory.spawn();
        Self {
            session: Arc::new(RwLock::new(session)),
            factory,
        }
    }

    pub async fn current(&self) -> SessionHandle {
        self.session.read().await.clone()
    }

    /// Start a fresh session. The old one stops once in-flight requests drop
    /// their handles.
    pub async fn reset(&self) -> SessionHandle {
        let fresh = self.factory.spawn();
        let previous = std::mem::replace(&mut *self.session.write().await, fresh.clone());
        tracing::info!(previous = previous.id(), current = fresh.id(), "Session reset");
        fresh
    }
}
