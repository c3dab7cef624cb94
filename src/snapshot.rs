//! Background persistence of the store to a JSON file on disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use crate::store::Store;

/// Periodically serializes the store to a file, plus once more on shutdown.
///
/// Persistence is best-effort: a failed periodic tick is logged and retried
/// on the next one. Only the final shutdown-triggered persist is allowed to
/// fail the process.
pub struct Snapshotter {
    store: Arc<Store>,
    path: PathBuf,
    period: Duration,
}

impl Snapshotter {
    pub fn new(store: Arc<Store>, path: impl Into<PathBuf>, period: Duration) -> Self {
        Self {
            store,
            path: path.into(),
            period,
        }
    }

    /// Runs the snapshot loop until `shutdown` fires.
    ///
    /// On shutdown the loop persists exactly one final time and returns that
    /// result, so the caller can join this task knowing no persist is still
    /// in flight.
    pub async fn run(self, mut shutdown: watch::Receiver<()>) -> Result<()> {
        let mut ticker = interval(self.period);
        // The first tick completes immediately; consume it so the first
        // persist lands one full period after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.persist() {
                        warn!(error = ?err, "periodic snapshot failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("persisting store before shutdown");
                    return self.persist().context("final snapshot failed");
                }
            }
        }
    }

    /// Serializes a point-in-time copy of the store to the snapshot file.
    ///
    /// The copy is taken under the store lock, serialization and I/O happen
    /// after the lock is released. The file is written to a temporary name
    /// in the same directory and renamed into place, so a crash mid-write
    /// never leaves a truncated snapshot behind.
    pub fn persist(&self) -> Result<()> {
        let entries = self.store.snapshot();
        let encoded = serde_json::to_vec(&entries).context("failed to serialize store")?;

        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        file.write_all(&encoded).context("failed to write snapshot")?;
        file.persist(&self.path)
            .with_context(|| format!("failed to replace snapshot at {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use tempfile::TempDir;
    use tokio::time::timeout;

    use super::*;

    const LONG_PERIOD: Duration = Duration::from_secs(3600);

    fn seeded_store() -> Arc<Store> {
        let store = Arc::new(Store::new());
        store.put("alpha".into(), "one".into()).expect("put");
        store.put("beta".into(), "two".into()).expect("put");
        store
    }

    fn read_snapshot(path: &Path) -> BTreeMap<String, String> {
        let raw = fs::read(path).expect("read snapshot file");
        serde_json::from_slice(&raw).expect("parse snapshot json")
    }

    #[test]
    fn persist_writes_the_store_as_json() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("database.json");
        let store = seeded_store();

        let snapshotter = Snapshotter::new(Arc::clone(&store), &path, LONG_PERIOD);
        snapshotter.persist().expect("persist");

        assert_eq!(read_snapshot(&path), store.snapshot());
    }

    #[test]
    fn persist_overwrites_previous_snapshots_wholesale() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("database.json");
        let store = seeded_store();
        let snapshotter = Snapshotter::new(Arc::clone(&store), &path, LONG_PERIOD);

        snapshotter.persist().expect("first persist");
        store.delete("alpha");
        store.put("gamma".into(), "three".into()).expect("put");
        snapshotter.persist().expect("second persist");

        let snapshot = read_snapshot(&path);
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key("alpha"));
        assert_eq!(snapshot.get("gamma"), Some(&"three".to_string()));
    }

    #[test]
    fn persist_fails_when_the_directory_is_missing() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing").join("database.json");
        let snapshotter = Snapshotter::new(seeded_store(), path, LONG_PERIOD);

        assert!(snapshotter.persist().is_err());
    }

    #[tokio::test]
    async fn shutdown_triggers_one_final_persist() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("database.json");
        let store = seeded_store();

        // The period is long enough that only the final persist can run.
        let snapshotter = Snapshotter::new(Arc::clone(&store), &path, LONG_PERIOD);
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let task = tokio::spawn(snapshotter.run(shutdown_rx));

        assert!(!path.exists());
        shutdown_tx.send(()).expect("signal shutdown");

        timeout(Duration::from_secs(5), task)
            .await
            .expect("snapshotter did not stop")
            .expect("snapshotter panicked")
            .expect("final persist failed");
        assert_eq!(read_snapshot(&path), store.snapshot());
    }

    #[tokio::test]
    async fn failed_final_persist_surfaces_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing").join("database.json");
        let snapshotter = Snapshotter::new(seeded_store(), path, LONG_PERIOD);
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let task = tokio::spawn(snapshotter.run(shutdown_rx));

        shutdown_tx.send(()).expect("signal shutdown");

        let result = timeout(Duration::from_secs(5), task)
            .await
            .expect("snapshotter did not stop")
            .expect("snapshotter panicked");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_also_stops_the_loop() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("database.json");
        let snapshotter = Snapshotter::new(seeded_store(), &path, LONG_PERIOD);
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let task = tokio::spawn(snapshotter.run(shutdown_rx));

        drop(shutdown_tx);

        timeout(Duration::from_secs(5), task)
            .await
            .expect("snapshotter did not stop")
            .expect("snapshotter panicked")
            .expect("final persist failed");
        assert!(path.exists());
    }
}
