//! The explicit per-logon session object.
//!
//! Everything a consumer needs — the title cache, the asset store, the sync
//! state — hangs off the session returned by [`LibrarySession::logon`];
//! there is no process-wide state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{error, info};

use vitrine_model::{AssetType, TitleEvent, TitleId};

use crate::assets::store::AssetCacheStore;
use crate::assets::sync::AssetSynchronizer;
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::providers::MetadataProvider;
use crate::titles::cache::TitleIdentityCache;
use crate::transport::AssetTransport;

/// Where the session's single sync worker currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
    Complete,
}

/// One logged-on library session.
pub struct LibrarySession {
    config: Config,
    store: Arc<AssetCacheStore>,
    titles: Arc<TitleIdentityCache>,
    synchronizer: Arc<AssetSynchronizer>,
    subscribed: Vec<TitleId>,
    sync_state: Arc<Mutex<SyncState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for LibrarySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibrarySession")
            .field("subscribed", &self.subscribed.len())
            .field("cache_root", &self.config.cache_root())
            .finish()
    }
}

impl LibrarySession {
    /// Loads the cache snapshot and populates the title cache from the
    /// subscribed-titles list.
    pub async fn logon(
        config: Config,
        provider: Arc<dyn MetadataProvider>,
        transport: Arc<dyn AssetTransport>,
    ) -> anyhow::Result<Self> {
        config.ensure_directories()?;

        let store = Arc::new(AssetCacheStore::new(config.assets_dir()));
        store.load().await;

        let titles =
            Arc::new(TitleIdentityCache::new(Arc::clone(&provider)));
        let subscribed = provider.subscribed_titles().await?;
        titles.init_batch(&subscribed).await?;

        let synchronizer = Arc::new(AssetSynchronizer::new(
            Arc::clone(&store),
            Arc::clone(&titles),
            provider,
            transport,
            &config,
        ));

        info!("logged on with {} subscribed titles", subscribed.len());
        Ok(Self {
            config,
            store,
            titles,
            synchronizer,
            subscribed,
            sync_state: Arc::new(Mutex::new(SyncState::Idle)),
            worker: Mutex::new(None),
        })
    }

    /// Spawns the session's background sync worker. Only one batch may be
    /// in flight; a concurrent attempt gets `SyncInProgress`.
    pub async fn start_sync(&self) -> Result<()> {
        {
            let mut state = self.sync_state.lock().await;
            if *state == SyncState::Running {
                return Err(CoreError::SyncInProgress);
            }
            *state = SyncState::Running;
        }

        let synchronizer = Arc::clone(&self.synchronizer);
        let ids = self.subscribed.clone();
        let state = Arc::clone(&self.sync_state);
        let handle = tokio::spawn(async move {
            synchronizer.run_batch(&ids).await;
            *state.lock().await = SyncState::Complete;
        });
        *self.worker.lock().await = Some(handle);
        Ok(())
    }

    pub async fn sync_state(&self) -> SyncState {
        *self.sync_state.lock().await
    }

    /// Awaits the in-flight batch, if any.
    pub async fn wait_for_sync(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!("sync worker failed: {e}");
        }
    }

    /// Awaits the batch (downloads are never cancelled) and persists the
    /// snapshot.
    pub async fn logoff(&self) -> Result<()> {
        self.wait_for_sync().await;
        self.store.save().await
    }

    /// Forces an immediate snapshot persist outside the batch cycle.
    pub async fn persist_now(&self) -> Result<()> {
        self.store.save().await
    }

    /// Synchronous path lookup; `None` until the asset is cached.
    pub fn local_asset_path(
        &self,
        id: TitleId,
        asset_type: AssetType,
    ) -> Option<PathBuf> {
        self.titles.get(id)?.assets()?.local_path(asset_type)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TitleEvent> {
        self.titles.subscribe()
    }

    pub fn titles(&self) -> &TitleIdentityCache {
        &self.titles
    }

    pub fn store(&self) -> &AssetCacheStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribed_titles(&self) -> &[TitleId] {
        &self.subscribed
    }
}
