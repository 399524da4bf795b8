use std::fmt;

/// The closed set of title categories the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TitleCategory {
    /// A store-published application or game.
    App,
    /// A user-added shortcut to a local executable.
    Shortcut,
}

impl TitleCategory {
    fn code(self) -> u8 {
        match self {
            TitleCategory::App => 1,
            TitleCategory::Shortcut => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TitleCategory::App),
            2 => Some(TitleCategory::Shortcut),
            _ => None,
        }
    }
}

/// Opaque 64-bit title identifier.
///
/// The low 32 bits carry the numeric app id; the byte above them carries the
/// category code. Identifiers with an unknown category code still round-trip
/// through the cache but can never be materialized as entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TitleId(u64);

impl TitleId {
    /// The all-zero id. Never a valid entity; pre-banned by the identity
    /// cache.
    pub const ZERO: TitleId = TitleId(0);

    const CATEGORY_SHIFT: u32 = 32;

    pub fn app(app_id: u32) -> Self {
        Self::packed(TitleCategory::App, app_id)
    }

    pub fn shortcut(local_id: u32) -> Self {
        Self::packed(TitleCategory::Shortcut, local_id)
    }

    fn packed(category: TitleCategory, low: u32) -> Self {
        TitleId(u64::from(category.code()) << Self::CATEGORY_SHIFT | u64::from(low))
    }

    pub fn from_raw(raw: u64) -> Self {
        TitleId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// The numeric app id portion, meaningful for every category.
    pub fn app_id(self) -> u32 {
        (self.0 & u64::from(u32::MAX)) as u32
    }

    /// Classifies the id; `None` for unrecognized category codes.
    pub fn category(self) -> Option<TitleCategory> {
        TitleCategory::from_code((self.0 >> Self::CATEGORY_SHIFT) as u8)
    }

    /// Like [`TitleId::category`], but unrecognized codes are an error.
    pub fn classify(self) -> crate::error::Result<TitleCategory> {
        self.category()
            .ok_or(crate::error::ModelError::UnsupportedCategory(self))
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0 && self.category().is_some()
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
