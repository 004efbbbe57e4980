use crate::error::{ChordError, Result};
use chordfs_proto::{Id, ID_BYTES};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Blobs held by this node, one file per key named by the key's hex id.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl LocalStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &Id) -> PathBuf {
        self.dir.join(key.to_string())
    }

    /// Writes through a temporary file so readers never see a partial blob.
    pub async fn write(&self, key: &Id, data: &[u8]) -> Result<()> {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, seq));
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, self.path(key)).await?;
        Ok(())
    }

    pub async fn read(&self, key: &Id) -> Result<Vec<u8>> {
        match fs::read(self.path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ChordError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Keys currently held, in ring order.
    pub async fn keys(&self) -> Result<Vec<Id>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(key) = entry
                .file_name()
                .to_str()
                .filter(|name| name.len() == ID_BYTES * 2)
                .and_then(|name| name.parse::<Id>().ok())
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
