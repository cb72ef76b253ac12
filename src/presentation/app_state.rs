// Application state for HTTP handlers
use crate::application::fleet_view_service::FleetViewService;
use crate::application::ingestion::IngestionController;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub view_service: FleetViewService,
    pub ingestion: Arc<IngestionController>,
}

impl AppState {
    /// Release the update subscription and end live view streams so that
    /// in-flight responses can complete
    pub fn shutdown(&self) {
        self.view_service.shutdown();
        self.ingestion.close();
    }
}
