// Chunked NDJSON streaming utilities
use crate::domain::fleet_view::FleetView;
use crate::infrastructure::view_mapper::{fleet_view_to_dto, FleetViewDto};
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;

/// One JSON document per line, flushed as each view arrives
pub fn chunked_json_stream<S>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = FleetViewDto> + Send + 'static,
{
    let byte_stream = stream.map(serialize_chunk);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn serialize_chunk(view: FleetViewDto) -> Result<Bytes, std::io::Error> {
    let payload = serde_json::to_vec(&view).map_err(std::io::Error::other)?;

    let mut chunk = BytesMut::with_capacity(payload.len() + 1);
    chunk.put_slice(&payload);
    chunk.put_u8(b'\n');

    Ok(chunk.freeze())
}

/// Helper to create a streaming response from a receiver
pub fn stream_from_receiver(mut rx: mpsc::Receiver<FleetView>) -> impl IntoResponse {
    let stream = async_stream::stream! {
        while let Some(view) = rx.recv().await {
            yield fleet_view_to_dto(view);
        }
    };

    match chunked_json_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
