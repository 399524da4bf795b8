use crate::asset::AssetType;
use crate::ids::TitleId;

/// What changed about a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleChange {
    NameChanged,
    StateChanged,
    /// A local path for this asset became available.
    AssetCached(AssetType),
    /// The remote source reports a newer asset; a re-sync will refresh it.
    AssetUpdated(AssetType),
}

/// A typed change notification for one title, delivered over the session's
/// broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleEvent {
    pub title_id: TitleId,
    pub change: TitleChange,
}

impl TitleEvent {
    pub fn new(title_id: TitleId, change: TitleChange) -> Self {
        Self { title_id, change }
    }
}
