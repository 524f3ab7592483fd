//! Stream relay: forwards an upstream completion body to the caller as
//! `text/event-stream`.
//!
//! Chunks are passed through in arrival order without buffering or rewriting.
//! If the upstream fails mid-stream the response ends right after the last chunk
//! that arrived. No `[DONE]` is synthesized, so the caller sees a truncated stream.

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use futures::future::ready;
use futures::{StreamExt, TryStreamExt};
use tracing::warn;

use crate::llm_client::CompletionStream;

pub fn event_stream_response(stream: CompletionStream) -> Response {
    // The body must end, not error, at the first upstream failure.
    let body = Body::from_stream(
        stream
            .inspect_err(|e| warn!("Upstream stream failed mid-response: {e}"))
            .take_while(|chunk| ready(chunk.is_ok())),
    );

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};

    #[tokio::test]
    async fn test_chunks_are_forwarded_in_order() {
        let chunks: Vec<Result<Bytes, LlmError>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
            Ok(Bytes::from_static(b"\ndata: [DO")),
            Ok(Bytes::from_static(b"NE]\n\n")),
        ];
        let response = event_stream_response(stream::iter(chunks).boxed());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            &bytes[..],
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_truncates_the_body() {
        let chunks: Vec<Result<Bytes, LlmError>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Part\"}}]}\n\n",
            )),
            Err(LlmError::Api {
                status: 502,
                message: "reset".into(),
            }),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let response = event_stream_response(stream::iter(chunks).boxed());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        assert_eq!(
            &bytes[..],
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Part\"}}]}\n\n"
        );
        assert!(!String::from_utf8_lossy(&bytes).contains("[DONE]"));
    }
}
