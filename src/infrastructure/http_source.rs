// Telemetry backend adapter - REST bulk fetch plus the socket.io push channel
use crate::application::telemetry_source::{FleetPayload, TelemetrySource, UpdateStream};
use crate::infrastructure::config::SourceSettings;
use crate::infrastructure::socket_io;
use crate::infrastructure::wire::decode_fleet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpTelemetrySource {
    client: reqwest::Client,
    robots_url: String,
    updates_url: String,
}

impl HttpTelemetrySource {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let base = settings.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            robots_url: format!("{}{}", base, settings.robots_path),
            updates_url: websocket_url(base, &settings.updates_path)?,
        })
    }

    pub fn robots_url(&self) -> &str {
        &self.robots_url
    }

    pub fn updates_url(&self) -> &str {
        &self.updates_url
    }
}

/// Map the backend's http(s) base onto the matching websocket scheme
fn websocket_url(base: &str, path: &str) -> Result<String> {
    let (scheme, rest) = base
        .split_once("://")
        .with_context(|| format!("Base URL has no scheme: {}", base))?;

    let ws_scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => anyhow::bail!("Unsupported telemetry URL scheme: {}", other),
    };

    Ok(format!("{}://{}{}", ws_scheme, rest, path))
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn fetch_snapshot(&self) -> Result<FleetPayload> {
        let response = self
            .client
            .get(&self.robots_url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to telemetry backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Fleet fetch failed with status {}: {}", status, body);
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse fleet response")?;

        let payload = decode_fleet(body)?;
        tracing::debug!(
            "Fetched {} robots from {} ({} rejected)",
            payload.records.len(),
            self.robots_url,
            payload.rejected
        );
        Ok(payload)
    }

    async fn subscribe(&self) -> Result<UpdateStream> {
        tracing::debug!("Opening update channel at {}", self.updates_url);
        socket_io::subscribe(&self.updates_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use futures::StreamExt;
    use serde_json::json;
    use std::net::SocketAddr;

    fn settings(base_url: String) -> SourceSettings {
        SourceSettings {
            base_url,
            robots_path: "/robots".to_string(),
            updates_path: "/socket.io/?EIO=4&transport=websocket".to_string(),
            request_timeout_secs: 2,
            reconnect_delay_ms: None,
        }
    }

    fn wire_fleet() -> serde_json::Value {
        json!([
            {
                "Robot ID": "3f2a9c1e-77b0-4d2e-9a51-0c6f1b8e2d44",
                "Online/Offline": true,
                "Battery Percentage": 15,
                "CPU Usage": 64,
                "RAM Consumption": 3072,
                "Location Coordinates": [40.7, -74.0],
                "Last Updated": "2024-11-02 10:15:00"
            },
            {
                "Robot ID": "b71e04d2-19aa-4c1b-8d0e-5f3a2c7e9b10",
                "Online/Offline": false,
                "Battery Percentage": 88,
                "CPU Usage": 12,
                "RAM Consumption": 7000,
                "Location Coordinates": [34.0, -118.2],
                "Last Updated": "2024-11-02 10:15:00"
            }
        ])
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn socket_io_backend(ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(scripted_session)
    }

    async fn scripted_session(mut socket: WebSocket) {
        let open = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
        if socket.send(Message::Text(open.to_string())).await.is_err() {
            return;
        }

        // Expect the namespace join before anything else
        match socket.recv().await {
            Some(Ok(Message::Text(text))) if text == "40" => {}
            _ => return,
        }
        let _ = socket.send(Message::Text(r#"40{"sid":"n1"}"#.to_string())).await;

        // Updates only flow once the client answers a ping
        let _ = socket.send(Message::Text("2".to_string())).await;
        match socket.recv().await {
            Some(Ok(Message::Text(text))) if text == "3" => {}
            _ => return,
        }

        let update = json!(["update", wire_fleet()]);
        let _ = socket.send(Message::Text(format!("42{}", update))).await;
        let _ = socket.send(Message::Text(r#"42["status",{"ok":true}]"#.to_string())).await;
        let _ = socket.send(Message::Text(r#"42["update","oops"]"#.to_string())).await;
        let _ = socket.send(Message::Text(r#"42["update",[]]"#.to_string())).await;
        let _ = socket.send(Message::Close(None)).await;
    }

    #[test]
    fn test_urls() {
        let source = HttpTelemetrySource::new(&settings("http://localhost:5000/".to_string())).unwrap();
        assert_eq!(source.robots_url(), "http://localhost:5000/robots");
        assert_eq!(
            source.updates_url(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );

        assert_eq!(websocket_url("https://fleet.example.com", "/ws").unwrap(), "wss://fleet.example.com/ws");
        assert!(websocket_url("localhost:5000", "/ws").is_err());
        assert!(websocket_url("ftp://localhost", "/ws").is_err());
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let router = Router::new().route("/robots", get(|| async { Json(wire_fleet()) }));
        let addr = serve(router).await;

        let source = HttpTelemetrySource::new(&settings(format!("http://{}", addr))).unwrap();
        let payload = source.fetch_snapshot().await.unwrap();

        assert_eq!(payload.records.len(), 2);
        assert_eq!(payload.records[0].battery_percent, 15.0);
        assert!(!payload.records[1].online);
    }

    #[tokio::test]
    async fn test_fetch_snapshot_failures() {
        let router = Router::new()
            .route("/robots", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "warming up") }))
            .route("/broken/robots", get(|| async { "{not json" }));
        let addr = serve(router).await;

        let source = HttpTelemetrySource::new(&settings(format!("http://{}", addr))).unwrap();
        let err = source.fetch_snapshot().await.unwrap_err();
        assert!(format!("{:#}", err).contains("503"));

        let source = HttpTelemetrySource::new(&settings(format!("http://{}/broken", addr))).unwrap();
        assert!(source.fetch_snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_streams_update_events() {
        let router = Router::new().route("/socket.io/", get(socket_io_backend));
        let addr = serve(router).await;

        let source = HttpTelemetrySource::new(&settings(format!("http://{}", addr))).unwrap();
        let mut updates = source.subscribe().await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].id, "3f2a9c1e-77b0-4d2e-9a51-0c6f1b8e2d44");

        let second = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        // The malformed update in between is skipped, not fatal
        assert!(second.records.is_empty());

        let end = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpTelemetrySource::new(&settings(format!("http://{}", addr))).unwrap();
        assert!(source.subscribe().await.is_err());
    }
}
