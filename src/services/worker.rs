use crate::services::storage::StorageService;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Periodically deletes uploads older than the retention window.
pub struct BackgroundWorker {
    storage: Arc<dyn StorageService>,
    retention: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        storage: Arc<dyn StorageService>,
        retention: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            storage,
            retention,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Retention worker started (retention={:?}, interval={:?})",
            self.retention,
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Retention worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    if let Err(e) = self.sweep_expired().await {
                        tracing::error!("Retention sweep failed: {}", e);
                    }
                }
            }
        }
    }

    /// Removes every stored file last modified before `now - retention`.
    /// Returns how many files were deleted.
    pub async fn sweep_expired(&self) -> Result<usize> {
        tracing::info!("🧹 Running upload retention sweep...");

        let cutoff = Utc::now() - chrono::Duration::from_std(self.retention)?;
        let mut removed = 0;

        for entry in self.storage.list_files().await? {
            if entry.modified >= cutoff {
                continue;
            }
            match self.storage.delete_file(&entry.name).await {
                Ok(()) => {
                    tracing::info!(
                        "Expired upload {} ({} bytes, modified {})",
                        entry.name,
                        entry.size_bytes,
                        entry.modified
                    );
                    removed += 1;
                }
                Err(e) => tracing::error!("Failed to expire upload {}: {}", entry.name, e),
            }
        }

        tracing::info!("✅ Retention sweep completed, {} file(s) removed", removed);
        Ok(removed)
    }
}
