use url::Url;

/// Categories of library artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssetType {
    /// 1:1 square icon.
    Icon,
    /// A logo, layered on top of the hero.
    Logo,
    Hero,
    Portrait,
}

impl AssetType {
    /// Every asset type, in the order a title's assets are processed.
    pub const ALL: [AssetType; 4] = [
        AssetType::Icon,
        AssetType::Logo,
        AssetType::Hero,
        AssetType::Portrait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Icon => "icon",
            AssetType::Logo => "logo",
            AssetType::Hero => "hero",
            AssetType::Portrait => "portrait",
        }
    }

    /// Per-type filename suffix for the deterministic on-disk layout.
    pub fn filename(self) -> &'static str {
        match self {
            AssetType::Icon => "icon.jpg",
            AssetType::Logo => "logo.png",
            AssetType::Hero => "hero.jpg",
            AssetType::Portrait => "portrait.jpg",
        }
    }

    /// Icons are keyed by content hash; every other type by
    /// last-modified/expiry timestamps.
    pub fn is_time_keyed(self) -> bool {
        !matches!(self, AssetType::Icon)
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogoHAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogoVAlign {
    Top,
    Center,
    Bottom,
}

/// Placement payload for logo assets: how large the logo renders relative to
/// the hero, and where it anchors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogoPosition {
    pub width_pct: f32,
    pub height_pct: f32,
    pub halign: LogoHAlign,
    pub valign: LogoVAlign,
}

impl Default for LogoPosition {
    fn default() -> Self {
        Self {
            width_pct: 50.0,
            height_pct: 50.0,
            halign: LogoHAlign::Center,
            valign: LogoVAlign::Center,
        }
    }
}

/// One title's remote-side description of a single asset.
///
/// A `None` locator means the asset is not fetched over the network; a
/// `file://` locator points at a user-supplied local file and is adopted
/// verbatim. `needs_update` overrides every staleness heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDescriptor {
    pub asset_type: AssetType,
    pub remote: Option<Url>,
    pub needs_update: bool,
    /// Currently only meaningful for `AssetType::Logo`.
    pub logo_position: Option<LogoPosition>,
}

impl AssetDescriptor {
    pub fn new(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            remote: None,
            needs_update: false,
            logo_position: None,
        }
    }

    /// True when the locator points at a local file rather than a remote
    /// origin.
    pub fn is_local_file(&self) -> bool {
        self.remote
            .as_ref()
            .is_some_and(|url| url.scheme() == "file")
    }
}
