//! Spawned I/O for chat and pull streams.
//!
//! Each stream runs on its own task, decodes the daemon's response with a
//! fresh [`StreamDecoder`], and forwards events tagged with the stream id.
//! The controller drops events whose id no longer matches its pending
//! stream, so cancelled streams never touch newer state.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::client::{ByteStream, TransportClient};
use crate::api::ChatMessage;
use crate::core::error::AppError;
use crate::core::stream_decoder::{StreamDecoder, StreamEvent, StreamKind};

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chat(StreamEvent),
    Install(StreamEvent),
}

pub struct ChatStreamParams {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

pub struct PullParams {
    pub model: String,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

pub type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;
pub type StreamReceiver = mpsc::UnboundedReceiver<(StreamMessage, u64)>;

#[derive(Clone)]
pub struct ChatStreamService {
    client: TransportClient,
    tx: StreamSender,
}

impl ChatStreamService {
    pub fn new(client: TransportClient) -> (Self, StreamReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { client, tx }, rx)
    }

    pub fn spawn_chat(&self, params: ChatStreamParams) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ChatStreamParams {
                model,
                messages,
                cancel_token,
                stream_id,
            } = params;
            debug!(stream_id, %model, turns = messages.len(), "Starting chat stream");

            tokio::select! {
                _ = async {
                    let body = client.chat_stream(&model, messages).await;
                    pump(body, StreamKind::Chat, StreamMessage::Chat, &tx, stream_id).await;
                } => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "Chat stream cancelled");
                }
            }
        });
    }

    pub fn spawn_pull(&self, params: PullParams) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let PullParams {
                model,
                cancel_token,
                stream_id,
            } = params;
            info!(stream_id, %model, "Starting model pull");

            tokio::select! {
                _ = async {
                    let body = client.pull_stream(&model).await;
                    pump(body, StreamKind::Pull, StreamMessage::Install, &tx, stream_id).await;
                } => {}
                _ = cancel_token.cancelled() => {
                    info!(stream_id, %model, "Model pull cancelled");
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

async fn pump(
    body: Result<ByteStream, AppError>,
    kind: StreamKind,
    wrap: fn(StreamEvent) -> StreamMessage,
    tx: &StreamSender,
    stream_id: u64,
) {
    let bytes = match body {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(stream_id, %err, "Stream request failed");
            let _ = tx.send((wrap(StreamEvent::StreamError(err)), stream_id));
            return;
        }
    };

    let events = StreamDecoder::new(kind).decode(bytes);
    futures_util::pin_mut!(events);
    while let Some(event) = events.next().await {
        if tx.send((wrap(event), stream_id)).is_err() {
            // Receiver gone: the app is shutting down.
            return;
        }
    }
}
