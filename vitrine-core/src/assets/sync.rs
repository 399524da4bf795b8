//! The synchronization engine: decides per title and per asset type whether
//! a refresh is needed, downloads under a bounded pool, and feeds the
//! generation pipeline.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use reqwest::StatusCode;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tracing::{debug, error, info, warn};
use url::Url;

use vitrine_model::{
    AssetCacheRecord, AssetType, TitleChange, TitleEvent, TitleId,
};

use crate::assets::generator::{DerivedAssetGenerator, GenerationRequest};
use crate::assets::store::AssetCacheStore;
use crate::config::Config;
use crate::error::Result;
use crate::providers::{MetadataProvider, StoreContext};
use crate::titles::cache::TitleIdentityCache;
use crate::titles::title::{AssetSlot, Title};
use crate::transport::AssetTransport;

/// Drives one synchronization batch over the session's titles.
pub struct AssetSynchronizer {
    store: Arc<AssetCacheStore>,
    titles: Arc<TitleIdentityCache>,
    provider: Arc<dyn MetadataProvider>,
    transport: Arc<dyn AssetTransport>,
    permits: Arc<Semaphore>,
    pending_generation: Mutex<Vec<GenerationRequest>>,
    context: StoreContext,
    cdn_base_url: Url,
    events: broadcast::Sender<TitleEvent>,
}

impl fmt::Debug for AssetSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetSynchronizer")
            .field("permits_available", &self.permits.available_permits())
            .finish()
    }
}

impl AssetSynchronizer {
    pub fn new(
        store: Arc<AssetCacheStore>,
        titles: Arc<TitleIdentityCache>,
        provider: Arc<dyn MetadataProvider>,
        transport: Arc<dyn AssetTransport>,
        config: &Config,
    ) -> Self {
        let events = titles.event_sender();
        Self {
            store,
            titles,
            provider,
            transport,
            permits: Arc::new(Semaphore::new(config.download.permits)),
            pending_generation: Mutex::new(Vec::new()),
            context: StoreContext {
                country_code: config.region.country_code.clone(),
                language: config.region.language.clone(),
            },
            cdn_base_url: config.cdn_base_url.clone(),
            events,
        }
    }

    /// Runs one full batch: adopt still-valid cached files, refresh stale
    /// assets under the permit bound, persist the snapshot once, then hand
    /// the accumulated requests to the generator. Failures degrade to
    /// "asset unavailable"; nothing escapes this method.
    pub async fn run_batch(self: &Arc<Self>, ids: &[TitleId]) {
        let titles = self.titles.get_many(ids);
        info!("synchronizing library assets for {} titles", titles.len());

        for title in &titles {
            self.adopt_cached_assets(title);
        }

        let mut tasks = Vec::new();
        for title in &titles {
            let Some(assets) = title.assets() else {
                continue;
            };
            let stale = assets
                .slots()
                .iter()
                .any(|slot| slot.local_path().is_none());
            if !stale {
                continue;
            }

            let sync = Arc::clone(self);
            let title = Arc::clone(title);
            tasks.push(tokio::spawn(async move {
                // One permit per title; all of its asset types run under it.
                let Ok(_permit) = sync.permits.clone().acquire_owned().await
                else {
                    return;
                };
                sync.update_title_assets(&title).await;
            }));
        }

        let results = futures::future::join_all(tasks).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!("{failed} per-title sync tasks aborted");
        }

        if let Err(e) = self.store.save().await {
            warn!("failed to persist asset cache snapshot: {e}");
        }

        self.run_generation().await;
    }

    /// Resolves which cached files are still authoritative and publishes
    /// their paths without touching the network.
    fn adopt_cached_assets(&self, title: &Title) {
        let Some(assets) = title.assets() else {
            return;
        };
        for slot in assets.slots() {
            if slot.local_path().is_some() {
                continue;
            }
            if let Some(path) = self.resolve_cached_asset(title, slot) {
                self.publish_local_path(title.id(), slot, path);
            }
        }
    }

    fn resolve_cached_asset(
        &self,
        title: &Title,
        slot: &AssetSlot,
    ) -> Option<PathBuf> {
        let descriptor = slot.descriptor();
        let remote = descriptor.remote.as_ref()?;
        if descriptor.is_local_file() {
            return remote.to_file_path().ok();
        }

        let asset_type = slot.asset_type();
        let title_id = title.id();
        let target = self.store.asset_path(title_id, asset_type);
        if !target.exists() {
            return None;
        }
        let record = self.store.record(title_id)?;

        // Fast path: nothing changed since the revision this record was
        // written at. Icons are excluded; they revalidate by hash alone.
        if asset_type.is_time_keyed()
            && record.last_change_number != 0
            && record.last_change_number == self.provider.last_change_number()
        {
            return Some(target);
        }

        let mut stale_reason = String::new();
        let up_to_date = if asset_type == AssetType::Icon {
            let current = title.icon_hash();
            if !record.icon_hash.is_empty() && record.icon_hash == current {
                true
            } else {
                stale_reason = format!(
                    "icon hash mismatch: cached '{}', current '{}'",
                    record.icon_hash, current
                );
                false
            }
        } else {
            let expires = record.expires_for(asset_type);
            let mut current = expires > now_unix();
            if !current {
                stale_reason = format!("expiry {expires} passed");
            }
            if descriptor.needs_update {
                stale_reason.push_str(" (needs_update override)");
                current = false;
            }
            current
        };

        if up_to_date {
            Some(target)
        } else {
            info!(
                "cached {asset_type} for title {title_id} not up to date: {stale_reason}"
            );
            None
        }
    }

    /// Refreshes every asset type of one title, sequentially in declared
    /// order. A failure on one type never aborts the others.
    async fn update_title_assets(&self, title: &Title) {
        let Some(assets) = title.assets() else {
            return;
        };
        let slots = assets.slots();
        for (index, slot) in slots.iter().enumerate() {
            let last_in_batch = index + 1 == slots.len();
            match self.update_asset(title, slot, last_in_batch).await {
                Ok(Some(path)) => {
                    self.publish_local_path(title.id(), slot, path);
                }
                Ok(None) => {}
                Err(e) => {
                    // Degrades to "unchanged this pass"; whatever is on
                    // disk stays authoritative.
                    warn!(
                        "failed to update {} for title {}: {e}",
                        slot.asset_type(),
                        title.id()
                    );
                }
            }
        }
    }

    async fn update_asset(
        &self,
        title: &Title,
        slot: &AssetSlot,
        last_in_batch: bool,
    ) -> Result<Option<PathBuf>> {
        let title_id = title.id();
        let asset_type = slot.asset_type();
        let descriptor = slot.descriptor();

        if descriptor.is_local_file() {
            // User-supplied file, adopted verbatim and never cached.
            return Ok(descriptor
                .remote
                .as_ref()
                .and_then(|url| url.to_file_path().ok()));
        }

        let view = self.store.view();
        let target = self.store.asset_path(title_id, asset_type);
        let mut record = view
            .get(&title_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        let current_hash = title.icon_hash();
        let assets_last_modified = title.assets_last_modified();

        let should_download = descriptor.remote.is_some()
            && needs_refresh(
                asset_type,
                descriptor.needs_update,
                &record,
                &current_hash,
                assets_last_modified,
            );

        let mut success = false;
        let mut will_generate = false;
        let mut status = None;

        if should_download && let Some(url) = &descriptor.remote {
            info!(
                "downloading {asset_type} for title {title_id} from {url}"
            );
            let response = self.transport.get(url).await?;
            status = Some(response.status);

            if response.is_success() {
                tokio::fs::write(&target, &response.body).await?;
                success = true;
                slot.clear_needs_update();
                if asset_type == AssetType::Icon {
                    record.icon_hash = current_hash.clone();
                } else {
                    match &response.last_modified {
                        Some(value) => record
                            .set_last_modified(asset_type, value.clone()),
                        None => warn!(
                            "no Last-Modified header on {asset_type} for title {title_id}"
                        ),
                    }
                    match response.expires.as_deref().map(parse_http_date) {
                        Some(Ok(expires)) => {
                            record.set_expires(asset_type, expires);
                        }
                        Some(Err(e)) => warn!(
                            "unparseable Expires header on {asset_type} for title {title_id}: {e}"
                        ),
                        None => warn!(
                            "no Expires header on {asset_type} for title {title_id}"
                        ),
                    }
                }
            } else if response.status == StatusCode::NOT_FOUND
                && asset_type.is_time_keyed()
            {
                self.queue_generation(title_id, asset_type).await;
                will_generate = true;
                // A provisional horizon keeps the title from being
                // re-queried every session while generation catches up.
                debug!(
                    "writing provisional expiry for {asset_type} of title {title_id}"
                );
                record.set_last_modified(asset_type, Utc::now().to_rfc2822());
                record.set_expires(asset_type, provisional_expiry());
            }
        }

        if last_in_batch {
            record.last_change_number = self.provider.last_change_number();
            record.store_assets_last_modified = assets_last_modified;
        }
        view.insert(title_id, record);

        if will_generate {
            return Ok(None);
        }
        if should_download && !success {
            error!(
                "failed to download {asset_type} for title {title_id} (status {status:?})"
            );
            return Ok(None);
        }
        if !target.exists() {
            return Ok(None);
        }
        Ok(Some(target))
    }

    async fn queue_generation(&self, title_id: TitleId, asset_type: AssetType) {
        let mut pending = self.pending_generation.lock().await;
        GenerationRequest::merge_into(&mut pending, title_id, asset_type);
    }

    async fn run_generation(&self) {
        let requests = {
            let mut pending = self.pending_generation.lock().await;
            std::mem::take(&mut *pending)
        };
        if requests.is_empty() {
            return;
        }

        let expected: Vec<TitleId> =
            requests.iter().map(|r| r.title_id).collect();
        let generator = DerivedAssetGenerator::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            self.context.clone(),
            self.cdn_base_url.clone(),
        );
        let generated = generator.generate(requests).await;

        for title_id in expected {
            if !generated.contains(&title_id) {
                error!("failed to generate library assets for title {title_id}");
            }
        }
    }

    fn publish_local_path(
        &self,
        title_id: TitleId,
        slot: &AssetSlot,
        path: PathBuf,
    ) {
        if slot.set_local_path(Some(path)) {
            let _ = self.events.send(TitleEvent::new(
                title_id,
                TitleChange::AssetCached(slot.asset_type()),
            ));
        }
    }
}

/// The per-type refresh decision, in precedence order: the `needs_update`
/// override wins (except against an unverifiable icon), titles without any
/// store assets skip their time-keyed types, icons compare hashes, and the
/// rest compare the store timestamp or have never been fetched.
fn needs_refresh(
    asset_type: AssetType,
    needs_update: bool,
    record: &AssetCacheRecord,
    current_hash: &str,
    assets_last_modified: i64,
) -> bool {
    if asset_type == AssetType::Icon {
        if current_hash.is_empty() {
            return false;
        }
        return needs_update || record.icon_hash != current_hash;
    }

    if needs_update {
        return true;
    }
    if assets_last_modified == 0 {
        return false;
    }
    record.store_assets_last_modified < assets_last_modified
        || record.expires_for(asset_type) == 0
}

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

fn provisional_expiry() -> i64 {
    (Utc::now() + Months::new(60)).timestamp()
}

fn parse_http_date(value: &str) -> chrono::ParseResult<i64> {
    DateTime::parse_from_rfc2822(value).map(|date| date.timestamp())
}
