// Newline-delimited JSON streaming responses
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;

/// Stream `items` to the client, one JSON document per line, flushed as they arrive
pub fn ndjson_stream<S, T>(items: S) -> Response<Body>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize,
{
    let byte_stream = items.map(|item| serialize_line(&item));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .unwrap_or_else(|e| {
            tracing::error!("Response build error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

fn serialize_line<T: Serialize>(item: &T) -> Result<Bytes, std::io::Error> {
    let mut line = serde_json::to_vec(item)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}
