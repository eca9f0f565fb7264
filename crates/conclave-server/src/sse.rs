//! Streams a `conclave_sse::Subscriber` out as a raw `text/event-stream`
//! body in the wire format SPEC_FULL.md §6.1 defines (`data: <TYPE>\n...`),
//! rather than axum's own named-`Event` SSE helper, since the client parses
//! the single-character type prefix itself.

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use conclave_sse::Subscriber;

pub fn stream_response(mut subscriber: Subscriber) -> Response {
    let stream = async_stream::stream! {
        loop {
            let event = subscriber.recv().await;
            let terminal = event.ty.is_terminal();
            yield Ok::<_, std::io::Error>(event.to_wire().into_bytes());
            if terminal {
                break;
            }
        }
    };

    let body = Body::from_stream(stream);
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .unwrap()
        .into_response()
}
