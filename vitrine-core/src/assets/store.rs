//! Disk persistence for the per-title asset cache snapshot.
//!
//! The snapshot is one binary file plus a human-readable JSON dump written
//! alongside for diagnostics (never read back). During a sync batch all
//! per-entry access goes through the shared concurrent view; the file I/O
//! and wholesale replacement take the coarse lock.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vitrine_model::{AssetCacheRecord, AssetType, TitleId};

use crate::error::{CoreError, Result};

const SNAPSHOT_FILE: &str = "assets.bin";
const SNAPSHOT_DUMP_FILE: &str = "assets.json";

const MAGIC: [u8; 8] = *b"VTRNAST1";
const VERSION: u32 = 1;

/// Owns the snapshot file and the concurrent in-memory view derived from it.
#[derive(Debug)]
pub struct AssetCacheStore {
    assets_dir: PathBuf,
    view: Arc<DashMap<TitleId, AssetCacheRecord>>,
    file_lock: Mutex<()>,
}

impl AssetCacheStore {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self {
            assets_dir,
            view: Arc::new(DashMap::new()),
            file_lock: Mutex::new(()),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// The concurrent view. Per-key updates need no further locking; one
    /// writer per title is the synchronizer's own invariant.
    pub fn view(&self) -> Arc<DashMap<TitleId, AssetCacheRecord>> {
        Arc::clone(&self.view)
    }

    pub fn record(&self, id: TitleId) -> Option<AssetCacheRecord> {
        self.view.get(&id).map(|entry| entry.value().clone())
    }

    /// Deterministic on-disk location for one title's asset.
    pub fn asset_path(&self, id: TitleId, asset_type: AssetType) -> PathBuf {
        self.assets_dir
            .join(format!("{}_{}", id.raw(), asset_type.filename()))
    }

    /// Loads the snapshot, replacing the view wholesale. A missing file or
    /// an unreadable one is not fatal: the cache starts from scratch.
    pub async fn load(&self) -> Arc<DashMap<TitleId, AssetCacheRecord>> {
        let _guard = self.file_lock.lock().await;
        let path = self.snapshot_path();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match decode_snapshot(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "failed to load cached asset metadata, starting from scratch: {e}"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no cached asset metadata, starting from scratch");
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "failed to read asset metadata from {}: {e}",
                    path.display()
                );
                Vec::new()
            }
        };

        self.view.clear();
        for (id, record) in entries {
            self.view.insert(id, record);
        }
        Arc::clone(&self.view)
    }

    /// Serializes the view into the binary snapshot and the JSON dump under
    /// one exclusive lock. This is the explicit durability call; there is no
    /// periodic flush.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.file_lock.lock().await;

        // Stable ordering keeps consecutive dumps diffable.
        let snapshot: BTreeMap<u64, AssetCacheRecord> = self
            .view
            .iter()
            .map(|entry| (entry.key().raw(), entry.value().clone()))
            .collect();

        let bytes = encode_snapshot(&snapshot);
        let path = self.snapshot_path();
        tokio::task::spawn_blocking(move || write_snapshot_sync(&path, &bytes))
            .await
            .map_err(|e| {
                CoreError::Internal(format!("snapshot write join error: {e}"))
            })??;

        let dump: BTreeMap<String, &AssetCacheRecord> = snapshot
            .iter()
            .map(|(id, record)| (id.to_string(), record))
            .collect();
        let json = serde_json::to_vec_pretty(&dump)?;
        tokio::fs::write(self.dump_path(), json).await?;

        debug!("saved asset cache snapshot ({} titles)", snapshot.len());
        Ok(())
    }

    fn snapshot_path(&self) -> PathBuf {
        self.assets_dir.join(SNAPSHOT_FILE)
    }

    fn dump_path(&self) -> PathBuf {
        self.assets_dir.join(SNAPSHOT_DUMP_FILE)
    }
}

fn encode_snapshot(snapshot: &BTreeMap<u64, AssetCacheRecord>) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + snapshot.len() * 96);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(snapshot.len() as u32).to_le_bytes());
    for (id, record) in snapshot {
        out.extend_from_slice(&id.to_le_bytes());
        write_string(&mut out, &record.icon_hash);
        write_string(&mut out, &record.logo_last_modified);
        out.extend_from_slice(&record.logo_expires.to_le_bytes());
        write_string(&mut out, &record.hero_last_modified);
        out.extend_from_slice(&record.hero_expires.to_le_bytes());
        write_string(&mut out, &record.portrait_last_modified);
        out.extend_from_slice(&record.portrait_expires.to_le_bytes());
        out.extend_from_slice(&record.last_change_number.to_le_bytes());
        out.extend_from_slice(&record.store_assets_last_modified.to_le_bytes());
    }
    out
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn decode_snapshot(
    buf: &[u8],
) -> anyhow::Result<Vec<(TitleId, AssetCacheRecord)>> {
    let mut reader = Reader { buf, pos: 0 };

    let magic = reader.take(MAGIC.len())?;
    anyhow::ensure!(magic == MAGIC, "bad snapshot magic");
    let version = reader.u32()?;
    anyhow::ensure!(version == VERSION, "unknown snapshot version {version}");

    let count = reader.u32()? as usize;
    let mut entries = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let id = TitleId::from_raw(reader.u64()?);
        let record = AssetCacheRecord {
            icon_hash: reader.string()?,
            logo_last_modified: reader.string()?,
            logo_expires: reader.i64()?,
            hero_last_modified: reader.string()?,
            hero_expires: reader.i64()?,
            portrait_last_modified: reader.string()?,
            portrait_expires: reader.i64()?,
            last_change_number: reader.u64()?,
            store_assets_last_modified: reader.i64()?,
        };
        entries.push((id, record));
    }
    Ok(entries)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> anyhow::Result<&'a [u8]> {
        let end = self.pos.checked_add(len);
        anyhow::ensure!(
            end.is_some_and(|end| end <= self.buf.len()),
            "truncated snapshot at offset {}",
            self.pos
        );
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> anyhow::Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into()?))
    }

    fn u64(&mut self) -> anyhow::Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into()?))
    }

    fn i64(&mut self) -> anyhow::Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into()?))
    }

    fn string(&mut self) -> anyhow::Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

fn write_snapshot_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(tmp_path, path)?;
    Ok(())
}
