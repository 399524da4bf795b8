//! Batch generation of hero/portrait art for titles whose store assets do
//! not exist remotely.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info};
use url::Url;

use vitrine_model::{AssetType, TitleId};

use crate::assets::compose;
use crate::assets::store::AssetCacheStore;
use crate::error::{CoreError, Result};
use crate::providers::{MetadataProvider, StoreContext, StoreItem};
use crate::transport::AssetTransport;

/// One title's outstanding generation work. Requests for the same title
/// merge by OR-ing the flags; the pending list never holds duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub title_id: TitleId,
    pub needs_hero: bool,
    pub needs_portrait: bool,
}

impl GenerationRequest {
    pub fn for_asset(title_id: TitleId, asset_type: AssetType) -> Self {
        Self {
            title_id,
            needs_hero: asset_type == AssetType::Hero,
            needs_portrait: asset_type == AssetType::Portrait,
        }
    }

    /// Merges `asset_type` into `pending`, OR-ing flags for an existing
    /// entry rather than duplicating the title.
    pub fn merge_into(
        pending: &mut Vec<GenerationRequest>,
        title_id: TitleId,
        asset_type: AssetType,
    ) {
        let addition = Self::for_asset(title_id, asset_type);
        match pending.iter_mut().find(|r| r.title_id == title_id) {
            Some(request) => {
                request.needs_hero |= addition.needs_hero;
                request.needs_portrait |= addition.needs_portrait;
            }
            None => pending.push(addition),
        }
    }
}

/// Resolves a batch of generation requests against the store catalog and
/// composes the missing artwork.
pub struct DerivedAssetGenerator {
    provider: Arc<dyn MetadataProvider>,
    transport: Arc<dyn AssetTransport>,
    store: Arc<AssetCacheStore>,
    context: StoreContext,
    cdn_base_url: Url,
}

impl fmt::Debug for DerivedAssetGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAssetGenerator")
            .field("cdn_base_url", &self.cdn_base_url)
            .finish()
    }
}

impl DerivedAssetGenerator {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        transport: Arc<dyn AssetTransport>,
        store: Arc<AssetCacheStore>,
        context: StoreContext,
        cdn_base_url: Url,
    ) -> Self {
        Self {
            provider,
            transport,
            store,
            context,
            cdn_base_url,
        }
    }

    /// Generates artwork for each request and returns the title ids for
    /// which every requested kind was produced. Per-title failures are
    /// logged and surface only by omission.
    pub async fn generate(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> HashSet<TitleId> {
        let mut satisfied = HashSet::new();
        let ids: Vec<TitleId> =
            requests.iter().map(|r| r.title_id).collect();
        info!("generating derived assets for {} titles", ids.len());

        let items = match self.provider.store_items(&ids, &self.context).await
        {
            Ok(items) => items,
            Err(e) => {
                error!("store catalog query for asset generation failed: {e}");
                return satisfied;
            }
        };

        for item in items {
            let Some(request) =
                requests.iter().find(|r| r.title_id == item.title_id)
            else {
                continue;
            };
            if !item.available
                || (!request.needs_hero && !request.needs_portrait)
            {
                continue;
            }

            let mut hero_ok = true;
            if request.needs_hero {
                hero_ok = match self.create_hero(&item).await {
                    Ok(created) => created,
                    Err(e) => {
                        error!(
                            "failed to generate hero for title {}: {e}",
                            item.title_id
                        );
                        false
                    }
                };
            }

            let mut portrait_ok = true;
            if request.needs_portrait {
                portrait_ok = match self.create_portrait(&item).await {
                    Ok(created) => created,
                    Err(e) => {
                        error!(
                            "failed to generate portrait for title {}: {e}",
                            item.title_id
                        );
                        false
                    }
                };
            }

            if hero_ok && portrait_ok {
                satisfied.insert(item.title_id);
            }
        }

        satisfied
    }

    async fn create_hero(&self, item: &StoreItem) -> Result<bool> {
        // Hero art comes from the first store screenshot, sorted
        // reverse-alphabetically by filename.
        let mut filenames = item.screenshot_filenames.clone();
        if filenames.is_empty() {
            return Ok(false);
        }
        filenames.sort();
        filenames.reverse();

        let url = self.cdn_url(&filenames[0])?;
        let response = self.transport.get(&url).await?;
        if !response.is_success() {
            return Ok(false);
        }

        let bytes = response.body;
        let encoded = spawn_compose(move || {
            let screenshot = image::load_from_memory(&bytes)?;
            compose::encode_jpeg(&compose::hero_from_screenshot(&screenshot))
        })
        .await?;

        let target = self.store.asset_path(item.title_id, AssetType::Hero);
        tokio::fs::write(target, encoded).await?;
        Ok(true)
    }

    async fn create_portrait(&self, item: &StoreItem) -> Result<bool> {
        let Some(header_path) = &item.header_path else {
            return Ok(false);
        };

        let url = self.cdn_url(header_path)?;
        let response = self.transport.get(&url).await?;
        if !response.is_success() {
            return Ok(false);
        }

        let bytes = response.body;
        let encoded = spawn_compose(move || {
            let header = image::load_from_memory(&bytes)?;
            compose::encode_jpeg(&compose::compose_portrait(&header))
        })
        .await?;

        let target =
            self.store.asset_path(item.title_id, AssetType::Portrait);
        tokio::fs::write(target, encoded).await?;
        Ok(true)
    }

    fn cdn_url(&self, path: &str) -> Result<Url> {
        self.cdn_base_url.join(path).map_err(|e| {
            CoreError::Internal(format!("bad CDN asset path '{path}': {e}"))
        })
    }
}

async fn spawn_compose(
    work: impl FnOnce() -> Result<Vec<u8>> + Send + 'static,
) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        CoreError::Internal(format!("compose task join error: {e}"))
    })?
}
