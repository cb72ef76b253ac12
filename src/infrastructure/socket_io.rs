// Socket.IO client - Engine.IO v4 framing over a websocket, `update` events only
use crate::application::telemetry_source::{FleetPayload, UpdateStream};
use crate::infrastructure::wire::{decode_fleet, WireError};
use anyhow::{anyhow, Context};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub const UPDATE_EVENT: &str = "update";
const DEFAULT_NAMESPACE: &str = "/";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error, PartialEq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown engine.io packet type {0:?}")]
    UnknownType(char),
    #[error("invalid ack id {0:?}")]
    InvalidAck(String),
    #[error("invalid packet data: {0}")]
    InvalidData(String),
    #[error("event packet without an event name")]
    MissingEventName,
}

impl From<serde_json::Error> for PacketError {
    fn from(e: serde_json::Error) -> Self {
        PacketError::InvalidData(e.to_string())
    }
}

/// Transport-level packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

/// Packet carried inside an engine.io message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
    /// Acks and binary packets; never sent by the telemetry backend
    Unsupported(char),
}

pub fn parse_engine_packet(text: &str) -> Result<EnginePacket, PacketError> {
    let kind = text.chars().next().ok_or(PacketError::Empty)?;
    let data = &text[kind.len_utf8()..];

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(data)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(data.to_string())),
        '3' => Ok(EnginePacket::Pong(data.to_string())),
        '4' => Ok(EnginePacket::Message(data.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PacketError::UnknownType(other)),
    }
}

/// Parse `<type>[/<namespace>,][<ack id>][<json>]`
pub fn parse_socket_packet(body: &str) -> Result<SocketPacket, PacketError> {
    let kind = body.chars().next().ok_or(PacketError::Empty)?;
    let mut rest = &body[kind.len_utf8()..];

    let namespace = if rest.starts_with('/') {
        let (namespace, tail) = match rest.find(',') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        rest = tail;
        namespace.to_string()
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let ack_id = if digits > 0 {
        let raw = &rest[..digits];
        Some(
            raw.parse::<u64>()
                .map_err(|_| PacketError::InvalidAck(raw.to_string()))?,
        )
    } else {
        None
    };
    rest = &rest[digits..];

    let data = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest)?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match data {
                Some(Value::Array(args)) => args,
                _ => return Err(PacketError::MissingEventName),
            };
            if args.is_empty() {
                return Err(PacketError::MissingEventName);
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                _ => return Err(PacketError::MissingEventName),
            };
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            })
        }
        '4' => Ok(SocketPacket::ConnectError { namespace, data }),
        other => Ok(SocketPacket::Unsupported(other)),
    }
}

/// Fleet carried by the first argument of an `update` event
pub fn fleet_from_event_args(args: Vec<Value>) -> Result<FleetPayload, WireError> {
    let payload = args.into_iter().next().ok_or(WireError::MissingPayload)?;
    decode_fleet(payload)
}

/// Connect, complete the engine.io handshake, join the default namespace and
/// return the stream of `update` payloads.
pub async fn subscribe(url: &str) -> anyhow::Result<UpdateStream> {
    let (mut socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("Failed to connect update channel at {}", url))?;

    let handshake = await_open(&mut socket).await?;
    tracing::debug!("Engine.io handshake: {}", handshake);

    // "4" message + "0" connect, default namespace
    socket
        .send(Message::Text("40".to_string()))
        .await
        .context("Failed to join socket.io namespace")?;

    Ok(update_stream(socket))
}

async fn await_open(socket: &mut Socket) -> anyhow::Result<Value> {
    while let Some(frame) = socket.next().await {
        if let Message::Text(text) = frame.context("Update channel handshake failed")? {
            match parse_engine_packet(&text) {
                Ok(EnginePacket::Open(handshake)) => return Ok(handshake),
                Ok(EnginePacket::Close) => break,
                Ok(other) => tracing::debug!("Ignoring packet before open: {:?}", other),
                Err(e) => anyhow::bail!("Invalid engine.io handshake: {}", e),
            }
        }
    }
    Err(anyhow!("Update channel closed during handshake"))
}

fn update_stream(mut socket: Socket) -> UpdateStream {
    let stream = async_stream::stream! {
        while let Some(frame) = socket.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Update channel close frame: {:?}", frame);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    yield Err(anyhow::Error::new(e).context("Update channel read failed"));
                    break;
                }
            };

            let body = match parse_engine_packet(&text) {
                Ok(EnginePacket::Message(body)) => body,
                Ok(EnginePacket::Ping(probe)) => {
                    if let Err(e) = socket.send(Message::Text(format!("3{}", probe))).await {
                        yield Err(anyhow::Error::new(e).context("Failed to answer engine.io ping"));
                        break;
                    }
                    continue;
                }
                Ok(EnginePacket::Close) => break,
                Ok(other) => {
                    tracing::debug!("Ignoring engine.io packet: {:?}", other);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Unparseable engine.io packet: {}", e);
                    continue;
                }
            };

            match parse_socket_packet(&body) {
                Ok(SocketPacket::Event { name, args, .. }) if name == UPDATE_EVENT => {
                    match fleet_from_event_args(args) {
                        Ok(payload) => yield Ok(payload),
                        Err(e) => tracing::warn!("Ignoring malformed update event: {}", e),
                    }
                }
                Ok(SocketPacket::Event { name, .. }) => {
                    tracing::debug!("Ignoring event {}", name);
                }
                Ok(SocketPacket::Connect { namespace, .. }) => {
                    tracing::debug!("Joined namespace {}", namespace);
                }
                Ok(SocketPacket::Disconnect { namespace }) => {
                    tracing::debug!("Server left namespace {}", namespace);
                    break;
                }
                Ok(SocketPacket::ConnectError { data, .. }) => {
                    yield Err(anyhow!("Namespace connect refused: {:?}", data));
                    break;
                }
                Ok(SocketPacket::Unsupported(kind)) => {
                    tracing::debug!("Ignoring socket.io packet type {}", kind);
                }
                Err(e) => tracing::warn!("Unparseable socket.io packet: {}", e),
            }
        }
    };

    Box::pin(stream)
}
