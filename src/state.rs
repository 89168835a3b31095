use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::{DataStore, MemoryStore};
use crate::users::service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UserService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn DataStore> = if config.seed_data {
            Arc::new(MemoryStore::seeded())
        } else {
            Arc::new(MemoryStore::new())
        };

        Ok(Self {
            service: Arc::new(UserService::new(store)),
            config,
        })
    }

    pub fn from_parts(store: Arc<dyn DataStore>, config: Arc<AppConfig>) -> Self {
        Self {
            service: Arc::new(UserService::new(store)),
            config,
        }
    }

    /// State over an empty in-memory store, for tests.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            seed_data: false,
        });
        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
