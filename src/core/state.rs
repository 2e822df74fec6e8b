use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::provider::TextGenerationProvider;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    provider: Option<Arc<dyn TextGenerationProvider>>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        provider: Option<Arc<dyn TextGenerationProvider>>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, provider }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    /// `None` when no API key is configured; generation then stays heuristic.
    pub(crate) fn provider(&self) -> Option<Arc<dyn TextGenerationProvider>> {
        self.inner.provider.clone()
    }
}
