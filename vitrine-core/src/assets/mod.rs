pub mod compose;
pub mod generator;
pub mod store;
pub mod sync;

pub use generator::{DerivedAssetGenerator, GenerationRequest};
pub use store::AssetCacheStore;
pub use sync::AssetSynchronizer;
