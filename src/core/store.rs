use anyhow::Context;
use async_trait::async_trait;
use crate::plugins::registry::StorageSink;
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Writes `image<N>.jpg` files into one directory per listing.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub async fn create(out_root: &Path, listing_name: &str) -> anyhow::Result<Self> {
        let mut name = sanitize(listing_name.trim());
        if name.is_empty() {
            name = "listing".to_string();
        }
        let dir = out_root.join(name);

        tokio::fs::create_dir_all(&dir).await
            .with_context(|| format!("create_dir_all {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "listing directory ready");

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, position: usize) -> PathBuf {
        self.dir.join(format!("image{}.jpg", position))
    }
}

#[async_trait]
impl StorageSink for DirectorySink {
    async fn write(&mut self, position: usize, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.image_path(position);
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}
