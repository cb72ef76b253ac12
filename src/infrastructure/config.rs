use crate::application::ingestion::ReconnectPolicy;
use crate::domain::filter::FilterMode;
use serde::Deserialize;
use std::time::Duration;

const CONFIG_FILE: &str = "config/dashboard";
const ENV_PREFIX: &str = "FLEET";

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub server: ServerSettings,
    pub source: SourceSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub listen_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    pub base_url: String,
    pub robots_path: String,
    pub updates_path: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub reconnect_delay_ms: Option<u64>,
}

impl SourceSettings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: self.reconnect_delay_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    pub default_filter: String,
    pub stream_buffer: usize,
}

impl DashboardSettings {
    pub fn default_filter(&self) -> FilterMode {
        FilterMode::from_label(&self.default_filter)
    }
}

/// Defaults, then `config/dashboard.*` if present, then `FLEET__SECTION__KEY` variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    load_with(config::File::with_name(CONFIG_FILE).required(false))
}

fn load_with<S>(file: S) -> anyhow::Result<DashboardConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .set_default("server.listen_addr", "0.0.0.0:8080")?
        .set_default("source.base_url", "http://localhost:5000")?
        .set_default("source.robots_path", "/robots")?
        .set_default("source.updates_path", "/socket.io/?EIO=4&transport=websocket")?
        .set_default("source.request_timeout_secs", 10)?
        .set_default("dashboard.default_filter", "all")?
        .set_default("dashboard.stream_buffer", 16)?
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
