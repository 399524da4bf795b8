use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Engine configuration, grouped by concern. Plain data; the session wires
/// it into the components at logon.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub download: DownloadConfig,
    pub region: RegionConfig,
    /// Base URL the generator fetches screenshots and header art from.
    pub cdn_base_url: Url,
}

impl Config {
    pub fn for_cache_root(root: impl Into<PathBuf>) -> Self {
        Self {
            cache: CacheConfig { root: root.into() },
            ..Self::default()
        }
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        self.cache.ensure_directories()
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.cache.assets_dir()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            download: DownloadConfig::default(),
            region: RegionConfig::default(),
            cdn_base_url: Url::parse("https://cdn.vitrine.app/")
                .expect("default CDN base URL is valid"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Per-installation cache directory; the asset store lives underneath.
    pub root: PathBuf,
}

impl CacheConfig {
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("library-assets")
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        let assets = self.assets_dir();
        std::fs::create_dir_all(&assets).map_err(|e| {
            anyhow::anyhow!(
                "failed to create asset cache dir {}: {e}",
                assets.display()
            )
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Admission bound for concurrent per-title sync tasks.
    pub permits: usize,
    pub http_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            // 30 max download tasks at a time, to avoid getting blocked by
            // the asset origin.
            permits: 30,
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Region/language qualification for store catalog queries.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub country_code: String,
    pub language: String,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            country_code: "US".to_string(),
            language: "english".to_string(),
        }
    }
}
