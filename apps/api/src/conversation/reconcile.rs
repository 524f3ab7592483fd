//! Incremental reconciliation of a streamed assistant answer.
//!
//! The body is a sequence of `\n`-terminated lines. `data: {chunk json}` lines carry
//! a text fragment, `data: [DONE]` ends the answer, anything else is ignored. Lines
//! are split on buffered bytes, so the result does not depend on how the body was
//! chunked, including UTF-8 characters split across reads.

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::conversation::log::ConversationLog;
use crate::conversation::message::{Message, MessageId};
use crate::llm_client::{ChatCompletionChunk, Role};

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

/// Splits a byte stream into events. Nothing is emitted after `Done`.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    done: bool,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consumes `bytes` and returns the events of every line it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let event = decode_line(&self.buffer[consumed..end]);
            consumed = end + 1;
            self.scanned = consumed;
            if self.record(event, &mut events) {
                self.buffer.clear();
                self.scanned = 0;
                return events;
            }
        }

        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();
        events
    }

    /// Flushes a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.scanned = 0;
            self.record(decode_line(&line), &mut events);
        }
        events
    }

    /// Returns true once the done marker was seen.
    fn record(&mut self, event: Option<StreamEvent>, events: &mut Vec<StreamEvent>) -> bool {
        match event {
            Some(StreamEvent::Done) => {
                self.done = true;
                events.push(StreamEvent::Done);
                true
            }
            Some(event) => {
                events.push(event);
                false
            }
            None => false,
        }
    }
}

fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;

    let payload = match std::str::from_utf8(payload) {
        Ok(p) => p.trim(),
        Err(e) => {
            warn!("Skipping stream line with invalid UTF-8: {e}");
            return None;
        }
    };

    if payload == DONE_MARKER {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => {
            let fragment = chunk.fragment();
            (!fragment.is_empty()).then(|| StreamEvent::Delta(fragment.to_string()))
        }
        Err(e) => {
            warn!("Skipping unparseable stream line: {e}");
            None
        }
    }
}

/// The assistant message being built for one turn. Its id is fixed up front.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    id: MessageId,
    accumulated: String,
}

impl AssistantTurn {
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            accumulated: String::new(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.accumulated
    }

    /// Appends `fragment` and returns the message snapshot to upsert.
    pub fn apply(&mut self, fragment: &str) -> Message {
        self.accumulated.push_str(fragment);
        Message::new(self.id, Role::Assistant, self.accumulated.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// `[DONE]` received.
    Completed,
    /// The body ended or failed first. The partial answer stays in the log.
    Interrupted,
    /// The question never reached a stream; an apology was logged instead.
    Failed,
}

/// Reads `body` to `[DONE]`, upserting the growing assistant message into `log`
/// after every fragment. `on_update` sees each snapshot and the fragment that
/// produced it.
pub async fn consume_stream<S, E, F>(
    log: &mut ConversationLog,
    body: S,
    mut on_update: F,
) -> TurnOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
    F: FnMut(&Message, &str),
{
    let mut turn = AssistantTurn::new(log.allocate_id());
    let mut decoder = DeltaDecoder::new();
    let mut apply = |events: Vec<StreamEvent>, log: &mut ConversationLog| -> bool {
        for event in events {
            match event {
                StreamEvent::Delta(fragment) => {
                    let message = turn.apply(&fragment);
                    on_update(&message, &fragment);
                    log.upsert(message);
                }
                StreamEvent::Done => return true,
            }
        }
        false
    };

    futures::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                if apply(decoder.feed(&bytes), &mut *log) {
                    debug!("Stream complete");
                    return TurnOutcome::Completed;
                }
            }
            Err(e) => {
                warn!("Stream failed before completion: {e}");
                return TurnOutcome::Interrupted;
            }
        }
    }

    if apply(decoder.finish(), &mut *log) {
        return TurnOutcome::Completed;
    }
    warn!("Stream closed without a done marker");
    TurnOutcome::Interrupted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sse_chunk, SSE_DONE};
    use futures::stream;
    use std::convert::Infallible;

    fn body_of(parts: &[&str]) -> String {
        parts.concat()
    }

    fn chunks(body: &[u8], size: usize) -> Vec<Result<Bytes, Infallible>> {
        body.chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }

    async fn run(parts: Vec<Result<Bytes, Infallible>>) -> (ConversationLog, TurnOutcome) {
        let mut log = ConversationLog::new();
        let outcome = consume_stream(&mut log, stream::iter(parts), |_, _| {}).await;
        (log, outcome)
    }

    #[test]
    fn test_decoder_emits_deltas_and_done() {
        let mut decoder = DeltaDecoder::new();
        let body = body_of(&[&sse_chunk("Hello"), &sse_chunk(", world"), SSE_DONE]);
        let events = decoder.feed(body.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hello".into()),
                StreamEvent::Delta(", world".into()),
                StreamEvent::Done,
            ]
        );
        assert!(decoder.is_done());
        assert!(decoder.feed(sse_chunk("late").as_bytes()).is_empty());
    }

    #[test]
    fn test_decoder_skips_noise_and_bad_json() {
        let mut decoder = DeltaDecoder::new();
        let body = format!(
            ": keep-alive\nevent: message\ndata: {{not json\n{}data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n",
            sse_chunk("ok")
        );
        assert_eq!(
            decoder.feed(body.as_bytes()),
            vec![StreamEvent::Delta("ok".into())]
        );
    }

    #[test]
    fn test_decoder_handles_crlf_and_trailing_line() {
        let mut decoder = DeltaDecoder::new();
        let events = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n");
        assert_eq!(events, vec![StreamEvent::Delta("a".into())]);
        assert!(decoder.feed(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Done]);
    }

    #[test]
    fn test_decoder_byte_at_a_time_never_rescans() {
        let fragment = "x".repeat(64 * 1024);
        let body = body_of(&[&sse_chunk(&fragment), SSE_DONE]);
        let mut decoder = DeltaDecoder::new();
        let mut events = Vec::new();

        for byte in body.as_bytes() {
            events.extend(decoder.feed(std::slice::from_ref(byte)));
            assert_eq!(decoder.scanned, decoder.buffer.len());
        }

        assert_eq!(events, vec![StreamEvent::Delta(fragment), StreamEvent::Done]);
        assert!(decoder.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_fragments_concatenate_into_one_message() {
        let body = body_of(&[&sse_chunk("A D color "), &sse_chunk("is colorless."), SSE_DONE]);
        let (log, outcome) = run(chunks(body.as_bytes(), body.len())).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(log.len(), 1);
        let message = &log.messages()[0];
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "A D color is colorless.");
    }

    #[tokio::test]
    async fn test_chunk_boundaries_do_not_matter() {
        let body = body_of(&[
            &sse_chunk("Brillant "),
            &sse_chunk("éclat ✨ "),
            &sse_chunk("💎"),
            SSE_DONE,
        ]);
        let (whole, _) = run(chunks(body.as_bytes(), body.len())).await;
        let (bytewise, outcome) = run(chunks(body.as_bytes(), 1)).await;
        let (odd, _) = run(chunks(body.as_bytes(), 7)).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(whole.messages(), bytewise.messages());
        assert_eq!(whole.messages(), odd.messages());
        assert_eq!(bytewise.messages()[0].content, "Brillant éclat ✨ 💎");
    }

    #[tokio::test]
    async fn test_updates_reuse_one_id() {
        let body = body_of(&[&sse_chunk("one "), &sse_chunk("two"), SSE_DONE]);
        let mut log = ConversationLog::new();
        log.push(Role::User, "Count?");
        let mut seen = Vec::new();
        consume_stream(&mut log, stream::iter(chunks(body.as_bytes(), 5)), |m, f| {
            seen.push((m.id, m.content.clone(), f.to_string()))
        })
        .await;

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, seen[1].0);
        assert_eq!(seen[0].1, "one ");
        assert_eq!(seen[1].1, "one two");
        assert_eq!(seen[1].2, "two");
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_close_before_done_is_interrupted() {
        let body = body_of(&[&sse_chunk("Partial "), &sse_chunk("answer")]);
        let (log, outcome) = run(chunks(body.as_bytes(), 3)).await;

        assert_eq!(outcome, TurnOutcome::Interrupted);
        assert_eq!(log.messages()[0].content, "Partial answer");
    }

    #[tokio::test]
    async fn test_error_mid_stream_keeps_partial_answer() {
        let first = sse_chunk("Partial");
        let parts: Vec<Result<Bytes, &str>> =
            vec![Ok(Bytes::from(first)), Err("connection reset")];
        let mut log = ConversationLog::new();
        let outcome = consume_stream(&mut log, stream::iter(parts), |_, _| {}).await;

        assert_eq!(outcome, TurnOutcome::Interrupted);
        assert_eq!(log.messages()[0].content, "Partial");
    }

    #[tokio::test]
    async fn test_bytes_after_done_are_ignored() {
        let body = body_of(&[&sse_chunk("Done."), SSE_DONE, &sse_chunk(" extra")]);
        let (log, outcome) = run(chunks(body.as_bytes(), body.len())).await;
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(log.messages()[0].content, "Done.");
    }
}
