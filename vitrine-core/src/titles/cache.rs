//! Session-lifetime identity cache for title entities.

use std::fmt;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use vitrine_model::{TitleCategory, TitleChange, TitleEvent, TitleId};

use crate::error::Result;
use crate::providers::{MetadataProvider, TitleInfo};
use crate::titles::title::{AppTitle, ShortcutTitle, Title};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Maps title ids to live entities for the lifetime of a session.
///
/// Entities are created on demand or in bulk and updated in place, so every
/// holder of an `Arc<Title>` observes metadata changes. Ids that cannot be
/// materialized go on a permanent ban list; looking one up yields the shared
/// `Unavailable` sentinel instead of an error.
pub struct TitleIdentityCache {
    provider: Arc<dyn MetadataProvider>,
    titles: DashMap<TitleId, Arc<Title>>,
    banned: DashSet<TitleId>,
    unavailable: Arc<Title>,
    events: broadcast::Sender<TitleEvent>,
}

impl fmt::Debug for TitleIdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TitleIdentityCache")
            .field("titles", &self.titles.len())
            .field("banned", &self.banned.len())
            .finish()
    }
}

impl TitleIdentityCache {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let banned = DashSet::new();
        // The zero id shows up in malformed library data; never construct it.
        banned.insert(TitleId::ZERO);
        Self {
            provider,
            titles: DashMap::new(),
            banned,
            unavailable: Arc::new(Title::Unavailable),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TitleEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<TitleEvent> {
        self.events.clone()
    }

    pub fn is_banned(&self, id: TitleId) -> bool {
        self.banned.contains(&id)
    }

    /// Tracked entity, or the sentinel for banned ids.
    pub fn get(&self, id: TitleId) -> Option<Arc<Title>> {
        if self.banned.contains(&id) {
            return Some(Arc::clone(&self.unavailable));
        }
        self.titles.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the cached entity or classifies and constructs one.
    /// Unrecognized categories are an error; banned ids yield the sentinel.
    pub fn get_or_create(&self, id: TitleId) -> Result<Arc<Title>> {
        if let Some(existing) = self.titles.get(&id) {
            return Ok(Arc::clone(existing.value()));
        }
        if self.banned.contains(&id) {
            return Ok(Arc::clone(&self.unavailable));
        }

        let category = id.classify()?;
        let entry = self
            .titles
            .entry(id)
            .or_insert_with(|| match category {
                TitleCategory::App => Arc::new(Title::App(AppTitle::new(id))),
                TitleCategory::Shortcut => {
                    Arc::new(Title::Shortcut(ShortcutTitle::new(id)))
                }
            });
        Ok(Arc::clone(entry.value()))
    }

    /// Bulk-fetches metadata and materializes an entity per id. Ids that
    /// fail to construct or that the provider cannot resolve are banned and
    /// logged; the rest of the batch proceeds.
    pub async fn init_batch(&self, ids: &[TitleId]) -> Result<()> {
        let infos = self.provider.title_info_batch(ids).await?;

        for &id in ids {
            if self.banned.contains(&id) {
                continue;
            }

            let title = match self.get_or_create(id) {
                Ok(title) => title,
                Err(e) => {
                    warn!("banning unconstructable title {id}: {e}");
                    self.banned.insert(id);
                    continue;
                }
            };

            match infos.get(&id) {
                Some(info) => title.apply_info(info, &self.events),
                None => {
                    warn!("no metadata for title {id}, banning");
                    self.titles.remove(&id);
                    self.banned.insert(id);
                }
            }
        }

        Ok(())
    }

    /// Applies a metadata change in place for tracked ids; untracked ids are
    /// constructed. Banned ids stay banned.
    pub fn on_metadata_changed(&self, id: TitleId, info: &TitleInfo) {
        if let Some(existing) = self.titles.get(&id) {
            existing.apply_info(info, &self.events);
            return;
        }
        match self.get_or_create(id) {
            Ok(title) => title.apply_info(info, &self.events),
            Err(e) => debug!("ignoring metadata change for title {id}: {e}"),
        }
    }

    /// Install/run state changed on the platform side.
    pub fn on_state_changed(&self, id: TitleId) {
        if self.titles.contains_key(&id) {
            let _ = self
                .events
                .send(TitleEvent::new(id, TitleChange::StateChanged));
        }
    }

    /// Entities for a batch of ids, skipping banned and unsupported ones.
    pub fn get_many(&self, ids: &[TitleId]) -> Vec<Arc<Title>> {
        let mut titles = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.banned.contains(&id) {
                continue;
            }
            match self.get_or_create(id) {
                Ok(title) => titles.push(title),
                Err(e) => debug!("skipping title {id}: {e}"),
            }
        }
        titles
    }
}
