use tokio_util::sync::CancellationToken;

use crate::api::ChatMessage;
use crate::core::context::ContextAttachment;
use crate::core::message::{Message, Role};

/// Handle for the stream currently feeding a chat session.
#[derive(Debug, Clone)]
pub struct PendingStream {
    pub id: u64,
    cancel_token: CancellationToken,
}

impl PendingStream {
    pub fn new(id: u64) -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        (
            Self {
                id,
                cancel_token: token.clone(),
            },
            token,
        )
    }

    fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// One conversation with a selected model.
#[derive(Debug)]
pub struct ChatSession {
    pub id: u64,
    pub model: String,
    pub messages: Vec<Message>,
    pub pending_stream: Option<PendingStream>,
    pub context_attachment: Option<ContextAttachment>,
    /// Request id of a context load that has not reported back yet.
    pub pending_context: Option<u64>,
}

impl ChatSession {
    pub fn new(id: u64, model: impl Into<String>) -> Self {
        Self {
            id,
            model: model.into(),
            messages: Vec::new(),
            pending_stream: None,
            context_attachment: None,
            pending_context: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.pending_stream.is_some()
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.pending_stream
            .as_ref()
            .is_some_and(|pending| pending.id == stream_id)
    }

    /// Append the user turn and an empty assistant placeholder, consuming any
    /// pending attachment. Returns the history to send, placeholder excluded.
    pub fn begin_exchange(&mut self, text: &str, pending: PendingStream) -> Vec<ChatMessage> {
        let content = match self.context_attachment.take() {
            Some(attachment) => attachment.merge_into(text),
            None => text.to_string(),
        };
        self.messages.push(Message::user(content));
        let history = self.messages.iter().map(Message::to_api).collect();
        self.messages.push(Message::assistant_placeholder());
        self.pending_stream = Some(pending);
        history
    }

    pub fn append_chunk(&mut self, chunk: &str) {
        if let Some(live) = self.live_message_mut() {
            live.content.push_str(chunk);
        }
    }

    /// Mark the live assistant message complete and forget the stream.
    /// Partial content is kept.
    pub fn finish_stream(&mut self) {
        if let Some(live) = self.live_message_mut() {
            live.complete = true;
        }
        self.pending_stream = None;
    }

    /// Ask the transport to stop and finish the live message. Returns whether
    /// a stream was active.
    pub fn cancel_stream(&mut self) -> bool {
        let Some(pending) = self.pending_stream.as_ref() else {
            return false;
        };
        pending.cancel();
        self.finish_stream();
        true
    }

    pub fn live_message(&self) -> Option<&Message> {
        self.messages
            .last()
            .filter(|message| message.role == Role::Assistant && !message.complete)
    }

    fn live_message_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|message| message.role == Role::Assistant && !message.complete)
    }
}
