// Application state module
// Immutable per-process state shared by every request

use std::sync::Arc;

use super::types::{Config, ValidationProfile};
use crate::backend::{self, CallPolicy, StorageBackend};
use crate::error::ConfigError;
use crate::kv::{DirKv, KvStore};

/// Application state
///
/// Built once at startup; requests only ever read it, so it is shared
/// behind an `Arc` without locks.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn StorageBackend>,
    /// Published static assets, if an asset directory is configured
    pub assets: Option<Arc<dyn KvStore>>,
    pub profile: ValidationProfile,
    pub policy: CallPolicy,
}

impl AppState {
    /// Wire the configured backend and asset store
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(config.http.server_name.clone())
            .build()?;
        let backend = backend::build(&config, http)?;

        let assets = match config.assets.dir.as_deref() {
            Some(dir) => Some(Arc::new(DirKv::open(dir)?) as Arc<dyn KvStore>),
            None => None,
        };

        Ok(Self::from_parts(config, backend, assets))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        assets: Option<Arc<dyn KvStore>>,
    ) -> Self {
        let profile = config.validation_profile();
        let policy = CallPolicy::from_config(&config.storage.retry);
        Self {
            config,
            backend,
            assets,
            profile,
            policy,
        }
    }
}
