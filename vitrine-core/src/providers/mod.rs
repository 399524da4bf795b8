pub mod traits;

pub use traits::{
    MetadataProvider, ProviderError, StoreContext, StoreItem, TitleInfo,
};
