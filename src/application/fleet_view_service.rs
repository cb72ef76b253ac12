// Fleet view service - Holds the filter selection and derives views from the snapshot
use crate::application::snapshot_store::{Snapshot, SnapshotStore};
use crate::domain::filter::FilterMode;
use crate::domain::fleet_view::FleetView;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Clone)]
pub struct FleetViewService {
    store: SnapshotStore,
    filter: Arc<watch::Sender<FilterMode>>,
    shutdown: Arc<watch::Sender<bool>>,
    stream_buffer: usize,
}

impl FleetViewService {
    pub fn new(store: SnapshotStore, default_filter: FilterMode, stream_buffer: usize) -> Self {
        let (filter, _rx) = watch::channel(default_filter);
        let (shutdown, _rx) = watch::channel(false);
        Self {
            store,
            filter: Arc::new(filter),
            shutdown: Arc::new(shutdown),
            stream_buffer: stream_buffer.max(1),
        }
    }

    pub fn filter(&self) -> FilterMode {
        *self.filter.borrow()
    }

    /// Select a filter mode. Re-selecting the current mode notifies nobody.
    pub fn set_filter(&self, mode: FilterMode) {
        self.filter.send_if_modified(|current| {
            if *current == mode {
                return false;
            }
            tracing::info!("Filter changed: {} -> {}", current.as_str(), mode.as_str());
            *current = mode;
            true
        });
    }

    /// End every open view stream, and any opened afterwards
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("Closing live view streams");
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// View for the selected filter
    pub fn view(&self) -> FleetView {
        self.view_with(self.filter())
    }

    /// View for an explicit filter, leaving the selection untouched
    pub fn view_with(&self, mode: FilterMode) -> FleetView {
        let snapshot = self.store.current();
        FleetView::compose(snapshot.version, &snapshot.records, mode)
    }

    /// Emit the current view, then a fresh one whenever the snapshot or the
    /// filter changes. The task stops once the receiver is dropped or the
    /// service shuts down.
    pub fn stream_views(&self) -> mpsc::Receiver<FleetView> {
        let (tx, rx) = mpsc::channel(self.stream_buffer);
        let mut snapshots = self.store.subscribe();
        let mut filters = self.filter.subscribe();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                if *shutdown.borrow_and_update() {
                    return;
                }

                let view = {
                    let snapshot = snapshots.borrow_and_update().clone();
                    let mode = *filters.borrow_and_update();
                    FleetView::compose(snapshot.version, &snapshot.records, mode)
                };

                let sent = tokio::select! {
                    biased;
                    _ = shutdown.changed() => return,
                    sent = tx.send(view) => sent,
                };
                if sent.is_err() {
                    tracing::debug!("View stream receiver dropped");
                    return;
                }

                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return,
                    changed = snapshots.changed() => if changed.is_err() { return },
                    changed = filters.changed() => if changed.is_err() { return },
                    _ = tx.closed() => return,
                }
            }
        });

        rx
    }
}
