// Snapshot store - Single source of truth for the current fleet
use crate::domain::robot::TelemetryRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub version: u64,
    pub replaced_at: Option<DateTime<Utc>>,
    pub records: Vec<TelemetryRecord>,
}

/// Readers always get a whole snapshot; `replace` swaps the shared pointer in one step
/// and wakes every subscriber.
#[derive(Clone)]
pub struct SnapshotStore {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self { tx: Arc::new(tx) }
    }

    /// Install `records` as the new fleet and return its version.
    pub fn replace(&self, records: Vec<TelemetryRecord>) -> u64 {
        let mut version = 0;
        self.tx.send_modify(|current| {
            version = current.version + 1;
            *current = Arc::new(Snapshot {
                version,
                replaced_at: Some(Utc::now()),
                records,
            });
        });
        tracing::debug!("Snapshot replaced: version {}", version);
        version
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
