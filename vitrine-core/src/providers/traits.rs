use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use vitrine_model::{AssetType, LogoPosition, TitleId};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Everything the engine knows about one title, as reported by the remote
/// metadata source.
#[derive(Debug, Clone, Default)]
pub struct TitleInfo {
    pub name: String,
    /// Hash of the currently published icon; empty when the title has none.
    pub icon_hash: String,
    /// Unix seconds of the newest store-asset publication; 0 when the title
    /// has no store assets at all.
    pub assets_last_modified: i64,
    pub icon_url: Option<Url>,
    pub logo_url: Option<Url>,
    pub hero_url: Option<Url>,
    pub portrait_url: Option<Url>,
    pub logo_position: Option<LogoPosition>,
}

impl TitleInfo {
    pub fn remote_for(&self, asset_type: AssetType) -> Option<&Url> {
        match asset_type {
            AssetType::Icon => self.icon_url.as_ref(),
            AssetType::Logo => self.logo_url.as_ref(),
            AssetType::Hero => self.hero_url.as_ref(),
            AssetType::Portrait => self.portrait_url.as_ref(),
        }
    }
}

/// One entry of a batched store-catalog response, the generator's raw
/// material.
#[derive(Debug, Clone)]
pub struct StoreItem {
    pub title_id: TitleId,
    /// False when the store refused to resolve the title for this region.
    pub available: bool,
    /// CDN-relative screenshot paths, unsorted.
    pub screenshot_filenames: Vec<String>,
    /// CDN-relative path of the header capsule, if the title has one.
    pub header_path: Option<String>,
}

/// Region/language qualification sent with store catalog queries.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub country_code: String,
    pub language: String,
}

/// Boundary to the remote metadata source and the platform's library state.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and
/// safe to call from many tasks at once.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// The current user's subscribed titles, the population of one session.
    async fn subscribed_titles(&self)
    -> Result<Vec<TitleId>, ProviderError>;

    /// Bulk metadata fetch. Ids absent from the result could not be
    /// resolved; callers decide what that means.
    async fn title_info_batch(
        &self,
        ids: &[TitleId],
    ) -> Result<HashMap<TitleId, TitleInfo>, ProviderError>;

    /// Monotonically increasing counter marking the freshest metadata
    /// revision this client has observed.
    fn last_change_number(&self) -> u64;

    /// Batched store-catalog query for the generation pipeline.
    async fn store_items(
        &self,
        ids: &[TitleId],
        context: &StoreContext,
    ) -> Result<Vec<StoreItem>, ProviderError>;
}
