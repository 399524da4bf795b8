pub mod cache;
pub mod title;

pub use cache::TitleIdentityCache;
pub use title::{AppTitle, AssetProfile, AssetSlot, ShortcutTitle, Title};
