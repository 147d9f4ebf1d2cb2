use std::{fs, io::ErrorKind, path::PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, error, warn};

use super::entities::CounterSnapshot;

/// Scalar preference store for the lifetime total, the daily count and the last reset moment.
/// Once [CounterStore::save] resolves the values are on disk. Loading happens once at startup and
/// stays blocking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Never fails. Missing or unreadable state starts counting from zero.
    fn load(&self) -> CounterSnapshot;

    async fn save(&self, snapshot: &CounterSnapshot) -> Result<()>;
}

#[async_trait]
impl<C: CounterStore + ?Sized> CounterStore for &C {
    fn load(&self) -> CounterSnapshot {
        (**self).load()
    }

    async fn save(&self, snapshot: &CounterSnapshot) -> Result<()> {
        (**self).save(snapshot).await
    }
}

/// Keeps the counters in a small json file.
pub struct JsonCounterStore {
    path: PathBuf,
}

impl JsonCounterStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn temporary_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CounterStore for JsonCounterStore {
    fn load(&self) -> CounterSnapshot {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No counters at {:?}, starting from zero", self.path);
                return CounterSnapshot::default();
            }
            Err(e) => {
                error!("Failed to read counters {:?}: {e}", self.path);
                return CounterSnapshot::default();
            }
        };

        serde_json::from_slice(&bytes)
            .inspect_err(|e| warn!("Counters file {:?} is corrupted {e}", self.path))
            .unwrap_or_default()
    }

    /// Runs on every counted event. The file work is done by tokio's blocking pool, the calling
    /// runtime keeps reading input meanwhile.
    async fn save(&self, snapshot: &CounterSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec(snapshot)?;

        // Written next to the target and renamed, so a crash leaves either the old or the new
        // counters.
        let temporary = self.temporary_path();
        let mut file = File::create(&temporary)
            .await
            .with_context(|| format!("Failed to create {temporary:?}"))?;
        file.write_all(&content).await?;
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(&temporary, &self.path)
            .await
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}
