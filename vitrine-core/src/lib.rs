//! Core engine for the Vitrine library artwork cache.
//!
//! The session object returned by [`LibrarySession::logon`] wires together
//! the cache store, the title identity cache, the bounded-concurrency
//! synchronizer, and the derived-asset generator. Consumers talk to the
//! session; the provider and transport boundaries stay behind traits.
#![allow(missing_docs)]

pub mod assets;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod titles;
pub mod transport;

// Intentionally curated re-exports for downstream consumers.
pub use assets::compose;
pub use assets::generator::{DerivedAssetGenerator, GenerationRequest};
pub use assets::store::AssetCacheStore;
pub use assets::sync::AssetSynchronizer;
pub use config::{CacheConfig, Config, DownloadConfig, RegionConfig};
pub use error::{CoreError, Result};
pub use providers::{
    MetadataProvider, ProviderError, StoreContext, StoreItem, TitleInfo,
};
pub use session::{LibrarySession, SyncState};
pub use titles::{AssetProfile, AssetSlot, Title, TitleIdentityCache};
pub use transport::{AssetResponse, AssetTransport, HttpTransport};
