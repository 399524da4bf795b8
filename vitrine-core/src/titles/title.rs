//! Title entities: the closed set of things a library can contain.
//!
//! Each variant that can carry artwork owns an [`AssetProfile`] resolved at
//! construction time, so downstream code never probes capabilities at
//! runtime.

use std::path::PathBuf;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::broadcast;
use url::Url;

use vitrine_model::{
    AssetDescriptor, AssetType, LogoPosition, TitleChange, TitleEvent, TitleId,
};

use crate::providers::TitleInfo;

/// One asset type's live state on a title: the remote-side descriptor plus
/// the locally cached path, both updated in place while holders keep their
/// `Arc<Title>`.
#[derive(Debug)]
pub struct AssetSlot {
    asset_type: AssetType,
    descriptor: RwLock<AssetDescriptor>,
    local_path: RwLock<Option<PathBuf>>,
}

impl AssetSlot {
    fn new(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            descriptor: RwLock::new(AssetDescriptor::new(asset_type)),
            local_path: RwLock::new(None),
        }
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn descriptor(&self) -> AssetDescriptor {
        self.descriptor.read().unwrap().clone()
    }

    pub fn needs_update(&self) -> bool {
        self.descriptor.read().unwrap().needs_update
    }

    /// Forces the next sync to refresh this asset regardless of the cache
    /// heuristics.
    pub fn mark_needs_update(&self) {
        self.descriptor.write().unwrap().needs_update = true;
    }

    pub(crate) fn clear_needs_update(&self) {
        self.descriptor.write().unwrap().needs_update = false;
    }

    pub fn local_path(&self) -> Option<PathBuf> {
        self.local_path.read().unwrap().clone()
    }

    /// Returns true when the stored path actually changed.
    pub(crate) fn set_local_path(&self, path: Option<PathBuf>) -> bool {
        let mut guard = self.local_path.write().unwrap();
        if *guard == path {
            return false;
        }
        *guard = path;
        true
    }

    fn set_remote(&self, remote: Option<Url>) {
        self.descriptor.write().unwrap().remote = remote;
    }

    fn set_logo_position(&self, position: Option<LogoPosition>) {
        self.descriptor.write().unwrap().logo_position = position;
    }
}

/// The asset-provider capability: four slots in declared order.
#[derive(Debug)]
pub struct AssetProfile {
    slots: [AssetSlot; 4],
}

impl AssetProfile {
    fn new() -> Self {
        Self {
            slots: AssetType::ALL.map(AssetSlot::new),
        }
    }

    pub fn slots(&self) -> &[AssetSlot] {
        &self.slots
    }

    pub fn slot(&self, asset_type: AssetType) -> &AssetSlot {
        let index = AssetType::ALL
            .iter()
            .position(|t| *t == asset_type)
            .unwrap_or(0);
        &self.slots[index]
    }

    pub fn local_path(&self, asset_type: AssetType) -> Option<PathBuf> {
        self.slot(asset_type).local_path()
    }

    fn apply_info(&self, info: &TitleInfo) {
        for slot in &self.slots {
            slot.set_remote(info.remote_for(slot.asset_type()).cloned());
            if slot.asset_type() == AssetType::Logo {
                slot.set_logo_position(info.logo_position);
            }
        }
    }
}

/// A store-published application or game.
#[derive(Debug)]
pub struct AppTitle {
    id: TitleId,
    name: RwLock<String>,
    icon_hash: RwLock<String>,
    assets_last_modified: AtomicI64,
    assets: AssetProfile,
}

impl AppTitle {
    pub(crate) fn new(id: TitleId) -> Self {
        Self {
            id,
            name: RwLock::new(String::new()),
            icon_hash: RwLock::new(String::new()),
            assets_last_modified: AtomicI64::new(0),
            assets: AssetProfile::new(),
        }
    }

    fn apply_info(
        &self,
        info: &TitleInfo,
        events: &broadcast::Sender<TitleEvent>,
    ) {
        {
            let mut name = self.name.write().unwrap();
            if *name != info.name {
                let renamed = !name.is_empty();
                *name = info.name.clone();
                if renamed {
                    let _ = events.send(TitleEvent::new(
                        self.id,
                        TitleChange::NameChanged,
                    ));
                }
            }
        }

        {
            let mut icon_hash = self.icon_hash.write().unwrap();
            if *icon_hash != info.icon_hash {
                let replaced = !icon_hash.is_empty();
                *icon_hash = info.icon_hash.clone();
                if replaced {
                    let _ = events.send(TitleEvent::new(
                        self.id,
                        TitleChange::AssetUpdated(AssetType::Icon),
                    ));
                }
            }
        }

        let previous = self
            .assets_last_modified
            .swap(info.assets_last_modified, Ordering::SeqCst);
        if previous != 0 && info.assets_last_modified > previous {
            for asset_type in AssetType::ALL {
                if asset_type.is_time_keyed()
                    && info.remote_for(asset_type).is_some()
                {
                    let _ = events.send(TitleEvent::new(
                        self.id,
                        TitleChange::AssetUpdated(asset_type),
                    ));
                }
            }
        }

        self.assets.apply_info(info);
    }
}

/// A user-added shortcut; its artwork is whatever the user supplied, often
/// `file://` locators.
#[derive(Debug)]
pub struct ShortcutTitle {
    id: TitleId,
    name: RwLock<String>,
    assets: AssetProfile,
}

impl ShortcutTitle {
    pub(crate) fn new(id: TitleId) -> Self {
        Self {
            id,
            name: RwLock::new(String::new()),
            assets: AssetProfile::new(),
        }
    }
}

/// Closed sum over everything the identity cache hands out.
///
/// `Unavailable` is the shared sentinel for permanently banned ids; it
/// carries no assets and never fails a lookup.
#[derive(Debug)]
pub enum Title {
    App(AppTitle),
    Shortcut(ShortcutTitle),
    Unavailable,
}

impl Title {
    pub fn id(&self) -> TitleId {
        match self {
            Title::App(app) => app.id,
            Title::Shortcut(shortcut) => shortcut.id,
            Title::Unavailable => TitleId::ZERO,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Title::App(app) => app.name.read().unwrap().clone(),
            Title::Shortcut(shortcut) => shortcut.name.read().unwrap().clone(),
            Title::Unavailable => String::new(),
        }
    }

    pub fn assets(&self) -> Option<&AssetProfile> {
        match self {
            Title::App(app) => Some(&app.assets),
            Title::Shortcut(shortcut) => Some(&shortcut.assets),
            Title::Unavailable => None,
        }
    }

    /// Hash of the currently published icon; empty for titles without one.
    pub fn icon_hash(&self) -> String {
        match self {
            Title::App(app) => app.icon_hash.read().unwrap().clone(),
            _ => String::new(),
        }
    }

    /// Unix seconds of the newest store-asset publication; 0 when the title
    /// has no store assets.
    pub fn assets_last_modified(&self) -> i64 {
        match self {
            Title::App(app) => app.assets_last_modified.load(Ordering::SeqCst),
            _ => 0,
        }
    }

    pub(crate) fn apply_info(
        &self,
        info: &TitleInfo,
        events: &broadcast::Sender<TitleEvent>,
    ) {
        match self {
            Title::App(app) => app.apply_info(info, events),
            Title::Shortcut(shortcut) => {
                *shortcut.name.write().unwrap() = info.name.clone();
                shortcut.assets.apply_info(info);
            }
            Title::Unavailable => {}
        }
    }
}
