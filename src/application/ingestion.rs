// Update ingestion - Initial fleet load plus the live update subscription
use crate::application::snapshot_store::SnapshotStore;
use crate::application::telemetry_source::{FleetPayload, TelemetrySource, UpdateStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("ingestion already started")]
    AlreadyStarted,
    #[error("ingestion has been closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    Disconnected { reason: String },
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionStatus {
    pub channel: ChannelState,
    pub last_fetch_error: Option<String>,
    pub updates_applied: u64,
}

impl Default for IngestionStatus {
    fn default() -> Self {
        Self {
            channel: ChannelState::Idle,
            last_fetch_error: None,
            updates_applied: 0,
        }
    }
}

/// Outcome of the one-shot fetch issued by `start`
#[derive(Debug, Clone, PartialEq)]
pub enum InitialLoad {
    Loaded { robots: usize, rejected: usize },
    Failed { reason: String },
}

/// `delay: None` leaves the channel down after a disconnect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectPolicy {
    pub delay: Option<Duration>,
}

enum Subscription {
    Idle,
    Open { shutdown: watch::Sender<bool> },
    Closed,
}

enum PumpExit {
    Shutdown,
    Ended(String),
}

pub struct IngestionController {
    source: Arc<dyn TelemetrySource>,
    store: SnapshotStore,
    reconnect: ReconnectPolicy,
    subscription: Mutex<Subscription>,
    status: Arc<watch::Sender<IngestionStatus>>,
}

impl IngestionController {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        store: SnapshotStore,
        reconnect: ReconnectPolicy,
    ) -> Self {
        let (status, _rx) = watch::channel(IngestionStatus::default());
        Self {
            source,
            store,
            reconnect,
            subscription: Mutex::new(Subscription::Idle),
            status: Arc::new(status),
        }
    }

    /// Open the update subscription in the background and load the fleet once.
    /// A failed load is reported, never retried, and leaves the snapshot as it was.
    pub async fn start(&self) -> Result<InitialLoad, IngestError> {
        {
            let mut slot = self.subscription.lock();
            match *slot {
                Subscription::Closed => return Err(IngestError::Closed),
                Subscription::Open { .. } => return Err(IngestError::AlreadyStarted),
                Subscription::Idle => {}
            }

            let (shutdown, shutdown_rx) = watch::channel(false);
            tokio::spawn(run_subscription(
                self.source.clone(),
                self.store.clone(),
                self.status.clone(),
                self.reconnect,
                shutdown_rx,
            ));
            *slot = Subscription::Open { shutdown };
        }

        Ok(self.load_initial().await)
    }

    async fn load_initial(&self) -> InitialLoad {
        match self.source.fetch_snapshot().await {
            Ok(payload) => {
                let robots = payload.records.len();
                let rejected = payload.rejected;
                let version = self.store.replace(payload.records);
                self.status.send_modify(|s| s.last_fetch_error = None);
                tracing::info!(
                    "Initial fleet loaded: {} robots, {} rejected (version {})",
                    robots,
                    rejected,
                    version
                );
                InitialLoad::Loaded { robots, rejected }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::error!("Failed to fetch robots: {}", reason);
                self.status
                    .send_modify(|s| s.last_fetch_error = Some(reason.clone()));
                InitialLoad::Failed { reason }
            }
        }
    }

    /// Release the update channel. Safe to call any number of times, before or after `start`.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.subscription.lock(), Subscription::Closed);
        match previous {
            Subscription::Open { shutdown } => {
                let _ = shutdown.send(true);
                tracing::info!("Update subscription closed");
            }
            Subscription::Idle => {
                tracing::debug!("Closing ingestion that was never started");
            }
            Subscription::Closed => return,
        }
        self.status.send_modify(|s| s.channel = ChannelState::Closed);
    }

    pub fn status(&self) -> IngestionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<IngestionStatus> {
        self.status.subscribe()
    }
}

impl Drop for IngestionController {
    fn drop(&mut self) {
        self.close();
    }
}

fn set_channel(status: &watch::Sender<IngestionStatus>, channel: ChannelState) {
    status.send_if_modified(|s| {
        // Closed is terminal
        if s.channel == ChannelState::Closed || s.channel == channel {
            return false;
        }
        s.channel = channel;
        true
    });
}

async fn run_subscription(
    source: Arc<dyn TelemetrySource>,
    store: SnapshotStore,
    status: Arc<watch::Sender<IngestionStatus>>,
    reconnect: ReconnectPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        set_channel(&status, ChannelState::Connecting);

        let opened = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            opened = source.subscribe() => opened,
        };

        let reason = match opened {
            Ok(stream) => {
                set_channel(&status, ChannelState::Connected);
                tracing::info!("Update channel connected");
                match pump_updates(stream, &store, &status, &mut shutdown).await {
                    PumpExit::Shutdown => break,
                    PumpExit::Ended(reason) => reason,
                }
            }
            Err(e) => format!("{:#}", e),
        };

        tracing::warn!("Update channel lost, keeping last snapshot: {}", reason);
        set_channel(&status, ChannelState::Disconnected { reason });

        let Some(delay) = reconnect.delay else {
            return;
        };
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {
                tracing::debug!("Reconnecting update channel after {:?}", delay);
            }
        }
    }

    set_channel(&status, ChannelState::Closed);
}

async fn pump_updates(
    mut stream: UpdateStream,
    store: &SnapshotStore,
    status: &watch::Sender<IngestionStatus>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return PumpExit::Shutdown,
            next = stream.next() => match next {
                Some(Ok(payload)) => apply_update(store, status, payload),
                Some(Err(e)) => return PumpExit::Ended(format!("{:#}", e)),
                None => return PumpExit::Ended("channel closed by peer".to_string()),
            },
        }
    }
}

fn apply_update(store: &SnapshotStore, status: &watch::Sender<IngestionStatus>, payload: FleetPayload) {
    let robots = payload.records.len();
    let version = store.replace(payload.records);
    status.send_modify(|s| s.updates_applied += 1);
    tracing::debug!(
        "Applied fleet update: {} robots, {} rejected (version {})",
        robots,
        payload.rejected,
        version
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::filter::FilterMode;
    use crate::domain::fleet_view::FleetView;
    use crate::domain::focus::ORIGIN;
    use crate::domain::robot::{robot, TelemetryRecord};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    pub(crate) type UpdateSender = mpsc::Sender<anyhow::Result<FleetPayload>>;

    /// In-memory backend: one scripted fetch result, one push channel fed by the test.
    pub(crate) struct FakeSource {
        fetch: Mutex<Option<anyhow::Result<FleetPayload>>>,
        updates: Mutex<Option<mpsc::Receiver<anyhow::Result<FleetPayload>>>>,
        pub(crate) subscribe_calls: AtomicUsize,
    }

    #[async_trait]
    impl TelemetrySource for FakeSource {
        async fn fetch_snapshot(&self) -> anyhow::Result<FleetPayload> {
            self.fetch
                .lock()
                .take()
                .unwrap_or_else(|| Err(anyhow!("snapshot already fetched")))
        }

        async fn subscribe(&self) -> anyhow::Result<UpdateStream> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            let rx = self
                .updates
                .lock()
                .take()
                .ok_or_else(|| anyhow!("connection refused"))?;
            Ok(ReceiverStream::new(rx).boxed())
        }
    }

    pub(crate) fn fake_source(fetch: anyhow::Result<FleetPayload>) -> (Arc<FakeSource>, UpdateSender) {
        let (tx, rx) = mpsc::channel(8);
        let source = Arc::new(FakeSource {
            fetch: Mutex::new(Some(fetch)),
            updates: Mutex::new(Some(rx)),
            subscribe_calls: AtomicUsize::new(0),
        });
        (source, tx)
    }

    pub(crate) fn three_robots() -> Vec<TelemetryRecord> {
        vec![
            robot("offline-1", false, 90.0, 10.0, 10.0),
            robot("lowbat-1", true, 15.0, 20.0, 20.0),
            robot("nominal-1", true, 80.0, 30.0, 30.0),
        ]
    }

    pub(crate) async fn within<F: std::future::Future>(fut: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(2), fut)
            .await
            .expect("timed out")
    }

    async fn wait_for_channel(controller: &IngestionController, predicate: fn(&ChannelState) -> bool) {
        let mut rx = controller.watch_status();
        within(rx.wait_for(|s| predicate(&s.channel)))
            .await
            .expect("status sender dropped");
    }

    #[tokio::test]
    async fn test_initial_load_then_empty_update() {
        let (source, updates) = fake_source(Ok(FleetPayload::new(three_robots())));
        let store = SnapshotStore::new();
        let controller = IngestionController::new(source, store.clone(), ReconnectPolicy::default());

        let load = controller.start().await.unwrap();
        assert_eq!(load, InitialLoad::Loaded { robots: 3, rejected: 0 });

        let snapshot = store.current();
        let all = FleetView::compose(snapshot.version, &snapshot.records, FilterMode::All);
        assert_eq!((all.total, all.active), (3, 3));

        let low = FleetView::compose(snapshot.version, &snapshot.records, FilterMode::LowBattery);
        assert_eq!(low.active, 1);
        assert_eq!(low.robots[0].id, "lowbat-1");

        let mut rx = store.subscribe();
        rx.borrow_and_update();
        updates.send(Ok(FleetPayload::new(Vec::new()))).await.unwrap();
        within(rx.changed()).await.unwrap();

        let snapshot = store.current();
        for mode in FilterMode::ALL_MODES {
            let view = FleetView::compose(snapshot.version, &snapshot.records, mode);
            assert_eq!((view.total, view.active), (0, 0));
            assert_eq!(view.focus, ORIGIN);
        }
        assert_eq!(controller.status().updates_applied, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_snapshot_empty() {
        let (source, _updates) = fake_source(Err(anyhow!("connection refused")));
        let store = SnapshotStore::new();
        let controller = IngestionController::new(source, store.clone(), ReconnectPolicy::default());

        let load = controller.start().await.unwrap();
        assert!(matches!(load, InitialLoad::Failed { ref reason } if reason.contains("connection refused")));
        assert_eq!(store.current().version, 0);
        assert!(store.current().records.is_empty());
        assert!(controller.status().last_fetch_error.is_some());
    }

    #[tokio::test]
    async fn test_channel_error_keeps_last_snapshot() {
        let (source, updates) = fake_source(Ok(FleetPayload::new(three_robots())));
        let store = SnapshotStore::new();
        let controller = IngestionController::new(source.clone(), store.clone(), ReconnectPolicy::default());
        controller.start().await.unwrap();

        updates.send(Err(anyhow!("connection reset"))).await.unwrap();
        wait_for_channel(&controller, |c| matches!(c, ChannelState::Disconnected { .. })).await;

        let snapshot = store.current();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.records.len(), 3);
        assert_eq!(source.subscribe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_after_channel_drop() {
        let (source, updates) = fake_source(Ok(FleetPayload::new(three_robots())));
        let store = SnapshotStore::new();
        let controller = IngestionController::new(source, store.clone(), ReconnectPolicy::default());
        controller.start().await.unwrap();

        drop(updates);
        wait_for_channel(&controller, |c| matches!(c, ChannelState::Disconnected { .. })).await;

        controller.close();
        controller.close();

        assert_eq!(controller.status().channel, ChannelState::Closed);
        let snapshot = store.current();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.records, three_robots());
    }

    #[tokio::test]
    async fn test_reconnect_policy_resubscribes() {
        let (source, updates) = fake_source(Ok(FleetPayload::new(three_robots())));
        let store = SnapshotStore::new();
        let policy = ReconnectPolicy {
            delay: Some(Duration::from_millis(5)),
        };
        let controller = IngestionController::new(source.clone(), store.clone(), policy);
        controller.start().await.unwrap();
        wait_for_channel(&controller, |c| *c == ChannelState::Connected).await;

        drop(updates);
        within(async {
            while source.subscribe_calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        assert_eq!(store.current().records.len(), 3);
        controller.close();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (source, _updates) = fake_source(Ok(FleetPayload::new(three_robots())));
        let controller = IngestionController::new(source, SnapshotStore::new(), ReconnectPolicy::default());

        controller.close();
        controller.close();
        assert_eq!(controller.status().channel, ChannelState::Closed);
        assert_eq!(controller.start().await, Err(IngestError::Closed));
    }

    #[tokio::test]
    async fn test_close_stops_applying_updates() {
        let (source, updates) = fake_source(Ok(FleetPayload::new(three_robots())));
        let store = SnapshotStore::new();
        let controller = IngestionController::new(source, store.clone(), ReconnectPolicy::default());
        controller.start().await.unwrap();
        assert_eq!(controller.start().await, Err(IngestError::AlreadyStarted));

        controller.close();
        controller.close();

        let _ = updates.send(Ok(FleetPayload::new(Vec::new()))).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.current().version, 1);
        assert_eq!(controller.status().channel, ChannelState::Closed);
        assert_eq!(controller.start().await, Err(IngestError::Closed));
    }
}
