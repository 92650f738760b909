//! Incremental decoding of the daemon's line-delimited JSON streams.
//!
//! Chat and pull responses share the framing: one JSON object per `\n`
//! terminated line. [`StreamDecoder`] buffers raw bytes, decodes complete
//! lines, and yields typed [`StreamEvent`]s. Each decoder ends with exactly one
//! terminal event (`Completion` or `StreamError`) and yields nothing after it.

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::{stream, Stream, StreamExt};
use memchr::memchr;
use tracing::debug;

use crate::api::{ChatChunk, PullStatus};
use crate::core::error::AppError;

/// Consecutive undecodable lines tolerated before the stream is abandoned.
pub const MAX_CONSECUTIVE_MALFORMED: usize = 3;

/// Longest unterminated line buffered before it is discarded as malformed.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Chat,
    Pull,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Fraction(f64),
    Indeterminate,
}

impl Progress {
    pub fn from_counts(completed: Option<u64>, total: Option<u64>) -> Self {
        match (completed, total) {
            (Some(completed), Some(total)) if total > 0 => {
                Progress::Fraction((completed as f64 / total as f64).clamp(0.0, 1.0))
            }
            _ => Progress::Indeterminate,
        }
    }

    pub fn fraction(self) -> Option<f64> {
        match self {
            Progress::Fraction(value) => Some(value),
            Progress::Indeterminate => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Status line reported by the daemon, e.g. `pulling manifest`.
    pub detail: String,
    pub verifying: bool,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TokenChunk(String),
    Progress(ProgressUpdate),
    Completion,
    StreamError(AppError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completion | StreamEvent::StreamError(_))
    }
}

enum LineOutcome {
    Events(Vec<StreamEvent>),
    Malformed(String),
}

pub struct StreamDecoder {
    kind: StreamKind,
    buffer: Vec<u8>,
    malformed_run: usize,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            buffer: Vec::new(),
            malformed_run: 0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes, returning the events decoded from every complete line.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(bytes);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.decode_line(&line[..newline_pos], &mut events);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        if self.buffer.len() > MAX_LINE_BYTES {
            let pending = self.buffer.len();
            self.buffer.clear();
            self.record_malformed(
                format!("line exceeds {MAX_LINE_BYTES} bytes ({pending} buffered)"),
                &mut events,
            );
        }
        events
    }

    /// Signal end of input. A trailing unterminated line is decoded first; if
    /// the stream still has not terminated it ends as a connection failure.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.decode_line(&rest, &mut events);
        }
        if !self.finished {
            events.extend(self.fail(AppError::Connection(
                "stream ended before completion".to_string(),
            )));
        }
        events
    }

    /// Terminate the stream with `error`.
    pub fn fail(&mut self, error: AppError) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        self.buffer.clear();
        vec![StreamEvent::StreamError(error)]
    }

    /// Adapt a stream of byte chunks into a lazy stream of events.
    pub fn decode<S, B, E>(self, input: S) -> impl Stream<Item = StreamEvent>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let state = (self, Box::pin(input), VecDeque::new());
        stream::unfold(state, |(mut decoder, mut input, mut pending)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((event, (decoder, input, pending)));
                }
                if decoder.is_finished() {
                    return None;
                }
                match input.next().await {
                    Some(Ok(bytes)) => pending.extend(decoder.push_bytes(bytes.as_ref())),
                    Some(Err(err)) => {
                        pending.extend(decoder.fail(AppError::Connection(err.to_string())))
                    }
                    None => pending.extend(decoder.finish()),
                }
            }
        })
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let outcome = match std::str::from_utf8(raw) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    return;
                }
                match self.kind {
                    StreamKind::Chat => decode_chat_line(line),
                    StreamKind::Pull => decode_pull_line(line),
                }
            }
            Err(err) => LineOutcome::Malformed(format!("invalid UTF-8: {err}")),
        };

        match outcome {
            LineOutcome::Events(decoded) => {
                self.malformed_run = 0;
                for event in decoded {
                    let terminal = event.is_terminal();
                    events.push(event);
                    if terminal {
                        self.finished = true;
                        return;
                    }
                }
            }
            LineOutcome::Malformed(reason) => self.record_malformed(reason, events),
        }
    }

    fn record_malformed(&mut self, reason: String, events: &mut Vec<StreamEvent>) {
        self.malformed_run += 1;
        debug!(
            kind = ?self.kind,
            run = self.malformed_run,
            %reason,
            "Skipping malformed stream line"
        );
        if self.malformed_run >= MAX_CONSECUTIVE_MALFORMED {
            events.extend(self.fail(AppError::malformed_protocol()));
        }
    }
}

fn decode_chat_line(line: &str) -> LineOutcome {
    let chunk = match serde_json::from_str::<ChatChunk>(line) {
        Ok(chunk) => chunk,
        Err(err) => return LineOutcome::Malformed(err.to_string()),
    };

    if let Some(message) = chunk.error {
        return LineOutcome::Events(vec![StreamEvent::StreamError(AppError::Daemon {
            status: None,
            message,
        })]);
    }
    if chunk.message.is_none() && chunk.done.is_none() {
        return LineOutcome::Malformed("chat line without message or done flag".to_string());
    }

    let mut events = Vec::new();
    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            events.push(StreamEvent::TokenChunk(message.content));
        }
    }
    if chunk.done == Some(true) {
        events.push(StreamEvent::Completion);
    }
    LineOutcome::Events(events)
}

fn decode_pull_line(line: &str) -> LineOutcome {
    let status = match serde_json::from_str::<PullStatus>(line) {
        Ok(status) => status,
        Err(err) => return LineOutcome::Malformed(err.to_string()),
    };

    if let Some(message) = status.error {
        return LineOutcome::Events(vec![StreamEvent::StreamError(AppError::Daemon {
            status: None,
            message,
        })]);
    }
    let Some(detail) = status.status else {
        return LineOutcome::Malformed("pull line without status".to_string());
    };

    if detail == "success" {
        return LineOutcome::Events(vec![StreamEvent::Completion]);
    }

    let verifying = detail.starts_with("verifying");
    LineOutcome::Events(vec![StreamEvent::Progress(ProgressUpdate {
        verifying,
        progress: Progress::from_counts(status.completed, status.total),
        detail,
    })])
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chat_line(content: &str) -> String {
        format!(
            "{{\"model\":\"llama3\",\"message\":{{\"role\":\"assistant\",\"content\":{}}},\"done\":false}}\n",
            serde_json::to_string(content).expect("encode")
        )
    }

    const CHAT_DONE: &str = "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n";

    #[test]
    fn chat_lines_yield_chunks_then_completion() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let mut events = decoder.push_bytes(chat_line("Hi").as_bytes());
        events.extend(decoder.push_bytes(chat_line(" there").as_bytes()));
        events.extend(decoder.push_bytes(CHAT_DONE.as_bytes()));

        assert_eq!(
            events,
            vec![
                StreamEvent::TokenChunk("Hi".into()),
                StreamEvent::TokenChunk(" there".into()),
                StreamEvent::Completion,
            ]
        );
        assert!(decoder.is_finished());
        assert!(decoder.push_bytes(chat_line("late").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let line = chat_line("héllo");
        let bytes = line.as_bytes();
        let mut decoder = StreamDecoder::new(StreamKind::Chat);

        // Split in the middle of the multi-byte character.
        let split = line.find('é').expect("accent") + 1;
        assert!(decoder.push_bytes(&bytes[..split]).is_empty());
        let events = decoder.push_bytes(&bytes[split..]);
        assert_eq!(events, vec![StreamEvent::TokenChunk("héllo".into())]);
    }

    #[test]
    fn overlong_unterminated_lines_are_dropped_and_escalate() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let noise = vec![b'x'; MAX_LINE_BYTES + 1];

        assert!(decoder.push_bytes(&noise).is_empty());
        assert!(decoder.buffer.is_empty());
        assert!(decoder.push_bytes(&noise).is_empty());
        assert!(decoder.buffer.is_empty());

        let events = decoder.push_bytes(&noise);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::StreamError(err) => assert!(err.is_malformed_protocol()),
            other => panic!("expected malformed-protocol error, got {other:?}"),
        }
        assert!(decoder.is_finished());
    }

    #[test]
    fn overlong_line_resets_on_following_valid_line() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        assert!(decoder.push_bytes(&vec![b'x'; MAX_LINE_BYTES + 1]).is_empty());
        // The tail of the oversized line is one more malformed line.
        assert!(decoder.push_bytes(b"xx\n").is_empty());
        let events = decoder.push_bytes(chat_line("ok").as_bytes());
        assert_eq!(events, vec![StreamEvent::TokenChunk("ok".into())]);
        assert_eq!(decoder.malformed_run, 0);
    }

    #[test]
    fn three_consecutive_malformed_lines_escalate_once() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let mut events = decoder.push_bytes(b"not json\n{\"unrelated\":1}\n");
        assert!(events.is_empty());
        events.extend(decoder.push_bytes(b"<html>\n"));
        events.extend(decoder.push_bytes(chat_line("after").as_bytes()));
        events.extend(decoder.finish());

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::StreamError(err) => assert!(err.is_malformed_protocol()),
            other => panic!("expected malformed-protocol error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_run_resets_on_valid_line() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let mut events = decoder.push_bytes(b"garbage\ngarbage\n");
        events.extend(decoder.push_bytes(chat_line("ok").as_bytes()));
        events.extend(decoder.push_bytes(b"garbage\ngarbage\n\n\n"));
        events.extend(decoder.push_bytes(CHAT_DONE.as_bytes()));

        assert_eq!(
            events,
            vec![StreamEvent::TokenChunk("ok".into()), StreamEvent::Completion]
        );
    }

    #[test]
    fn invalid_utf8_counts_as_malformed() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let events = decoder.push_bytes(b"\xff\xfe\n\xff\n\xc3\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::StreamError(err) if err.is_malformed_protocol()));
    }

    #[test]
    fn daemon_error_line_terminates_stream() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let events = decoder.push_bytes(b"{\"error\":\"model 'x' not found\"}\n");
        assert_eq!(
            events,
            vec![StreamEvent::StreamError(AppError::Daemon {
                status: None,
                message: "model 'x' not found".into()
            })]
        );
    }

    #[test]
    fn eof_without_done_is_a_connection_error() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let mut events = decoder.push_bytes(chat_line("partial").as_bytes());
        events.extend(decoder.finish());
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            StreamEvent::StreamError(AppError::Connection(_))
        ));
    }

    #[test]
    fn unterminated_final_line_is_decoded_at_eof() {
        let mut decoder = StreamDecoder::new(StreamKind::Chat);
        let done = CHAT_DONE.trim_end();
        assert!(decoder.push_bytes(done.as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Completion]);
    }

    #[test]
    fn pull_lines_map_to_progress_and_completion() {
        let mut decoder = StreamDecoder::new(StreamKind::Pull);
        let events = decoder.push_bytes(
            concat!(
                "{\"status\":\"pulling manifest\"}\n",
                "{\"status\":\"pulling 6a0746a1ec1a\",\"digest\":\"sha256:6a07\",\"total\":200,\"completed\":50}\n",
                "{\"status\":\"verifying sha256 digest\"}\n",
                "{\"status\":\"success\"}\n",
            )
            .as_bytes(),
        );

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            StreamEvent::Progress(ProgressUpdate {
                detail: "pulling manifest".into(),
                verifying: false,
                progress: Progress::Indeterminate,
            })
        );
        assert_eq!(
            events[1],
            StreamEvent::Progress(ProgressUpdate {
                detail: "pulling 6a0746a1ec1a".into(),
                verifying: false,
                progress: Progress::Fraction(0.25),
            })
        );
        assert!(matches!(&events[2], StreamEvent::Progress(update) if update.verifying));
        assert_eq!(events[3], StreamEvent::Completion);
    }

    #[test]
    fn progress_fraction_is_clamped() {
        assert_eq!(
            Progress::from_counts(Some(300), Some(200)),
            Progress::Fraction(1.0)
        );
        assert_eq!(Progress::from_counts(Some(1), Some(0)), Progress::Indeterminate);
        assert_eq!(Progress::from_counts(None, Some(10)), Progress::Indeterminate);
    }

    #[tokio::test]
    async fn decode_adapts_chunk_streams_lazily() {
        let body = format!("{}{}{}", chat_line("a"), chat_line("b"), CHAT_DONE);
        let (first, second) = body.split_at(7);
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(first.as_bytes().to_vec()),
            Ok(second.as_bytes().to_vec()),
            Ok(chat_line("ignored").into_bytes()),
        ];

        let events: Vec<StreamEvent> = StreamDecoder::new(StreamKind::Chat)
            .decode(stream::iter(chunks))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TokenChunk("a".into()),
                StreamEvent::TokenChunk("b".into()),
                StreamEvent::Completion,
            ]
        );
    }

    #[tokio::test]
    async fn decode_maps_transport_errors_to_connection_failures() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(chat_line("partial").into_bytes()),
            Err("connection reset by peer".to_string()),
        ];

        let events: Vec<StreamEvent> = StreamDecoder::new(StreamKind::Chat)
            .decode(stream::iter(chunks))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TokenChunk("partial".into()),
                StreamEvent::StreamError(AppError::Connection(
                    "connection reset by peer".into()
                )),
            ]
        );
    }
}
