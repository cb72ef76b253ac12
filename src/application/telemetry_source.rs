// Port to the telemetry backend - bulk snapshot plus push updates
use crate::domain::robot::TelemetryRecord;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A complete fleet state as delivered by the backend, after record validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetPayload {
    pub records: Vec<TelemetryRecord>,
    /// Records dropped during decoding
    pub rejected: usize,
}

impl FleetPayload {
    pub fn new(records: Vec<TelemetryRecord>) -> Self {
        Self {
            records,
            rejected: 0,
        }
    }
}

/// Each item is a full replacement fleet. The stream ends when the channel closes.
pub type UpdateStream = BoxStream<'static, anyhow::Result<FleetPayload>>;

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the current fleet state once
    async fn fetch_snapshot(&self) -> anyhow::Result<FleetPayload>;

    /// Open the push channel
    async fn subscribe(&self) -> anyhow::Result<UpdateStream>;
}
