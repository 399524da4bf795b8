use crate::asset::AssetType;

/// Per-title cache bookkeeping, one record per title id in the snapshot.
///
/// Icons are validated by `icon_hash`; the time-keyed types carry the raw
/// `Last-Modified` header string plus a unix-seconds expiry. The by-type
/// accessors have inert Icon arms: icons have no timestamps to read or
/// write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssetCacheRecord {
    pub icon_hash: String,
    pub logo_last_modified: String,
    pub logo_expires: i64,
    pub hero_last_modified: String,
    pub hero_expires: i64,
    pub portrait_last_modified: String,
    pub portrait_expires: i64,
    pub last_change_number: u64,
    pub store_assets_last_modified: i64,
}

impl AssetCacheRecord {
    pub fn last_modified_for(&self, asset_type: AssetType) -> &str {
        match asset_type {
            AssetType::Icon => "",
            AssetType::Logo => &self.logo_last_modified,
            AssetType::Hero => &self.hero_last_modified,
            AssetType::Portrait => &self.portrait_last_modified,
        }
    }

    pub fn expires_for(&self, asset_type: AssetType) -> i64 {
        match asset_type {
            AssetType::Icon => 0,
            AssetType::Logo => self.logo_expires,
            AssetType::Hero => self.hero_expires,
            AssetType::Portrait => self.portrait_expires,
        }
    }

    pub fn set_last_modified(
        &mut self,
        asset_type: AssetType,
        last_modified: String,
    ) {
        match asset_type {
            AssetType::Icon => {}
            AssetType::Logo => self.logo_last_modified = last_modified,
            AssetType::Hero => self.hero_last_modified = last_modified,
            AssetType::Portrait => self.portrait_last_modified = last_modified,
        }
    }

    pub fn set_expires(&mut self, asset_type: AssetType, expires: i64) {
        match asset_type {
            AssetType::Icon => {}
            AssetType::Logo => self.logo_expires = expires,
            AssetType::Hero => self.hero_expires = expires,
            AssetType::Portrait => self.portrait_expires = expires,
        }
    }
}
