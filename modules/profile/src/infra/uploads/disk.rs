use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::domain::error::DomainError;
use crate::domain::ports::AvatarStore;

/// URL prefix under which stored files are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Writes avatars as `<unix millis><.ext>` into one directory.
pub struct DiskAvatarStore {
    dir: PathBuf,
}

impl DiskAvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Lower-cased alphanumeric extension of `name`, dot included.
fn extension_of(name: Option<&str>) -> String {
    name.and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[async_trait]
impl AvatarStore for DiskAvatarStore {
    async fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String, DomainError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DomainError::storage(format!("create {}: {e}", self.dir.display())))?;

        let ext = extension_of(original_name);
        let mut stamp = Utc::now().timestamp_millis();
        // same-millisecond uploads take the next free stamp
        let (file_name, mut file) = loop {
            let file_name = format!("{stamp}{ext}");
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&file_name))
                .await
            {
                Ok(f) => break (file_name, f),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(DomainError::storage(format!("open {file_name}: {e}"))),
            }
        };

        file.write_all(bytes)
            .await
            .map_err(|e| DomainError::storage(format!("write {file_name}: {e}")))?;
        file.flush()
            .await
            .map_err(|e| DomainError::storage(format!("flush {file_name}: {e}")))?;

        tracing::debug!(file = %file_name, size = bytes.len(), "avatar written");
        Ok(format!("{UPLOADS_URL_PREFIX}/{file_name}"))
    }
}
