use tracing::{debug, info};

use super::{reject, wrong_screen, AppAction, AppCommand, ContextRequest};
use crate::core::app::{App, PendingStream, ScreenState};
use crate::core::chat_stream::ChatStreamParams;
use crate::core::context::{ContextAttachment, ContextLoadError};
use crate::core::error::{AppError, ValidationError};
use crate::core::stream_decoder::StreamEvent;

pub(super) fn handle_chat_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SendMessage { text } => send_message(app, text),
        AppAction::ChatStreamEvent { stream_id, event } => {
            on_stream_event(app, stream_id, event);
            None
        }
        AppAction::AttachContext { path } => attach_context(app, path),
        AppAction::DetachContext => {
            if let ScreenState::Chat(session) = &mut app.screen {
                if session.context_attachment.take().is_some() {
                    app.ui.set_status("Context detached");
                }
            }
            None
        }
        AppAction::ContextLoaded {
            session_id,
            request_id,
            result,
        } => {
            on_context_loaded(app, session_id, request_id, result);
            None
        }
        AppAction::CancelStream => cancel_stream(app),
        _ => unreachable!("non-chat action routed to chat handler"),
    }
}

fn send_message(app: &mut App, text: String) -> Option<AppCommand> {
    if !matches!(app.screen, ScreenState::Chat(_)) {
        return wrong_screen(app, "Sending a message");
    }
    if app.is_streaming() {
        return reject(app, ValidationError::StreamActive);
    }
    if text.trim().is_empty() {
        return reject(app, ValidationError::EmptyMessage);
    }

    let stream_id = app.next_id();
    let ScreenState::Chat(session) = &mut app.screen else {
        return None;
    };

    let (pending, cancel_token) = PendingStream::new(stream_id);
    let messages = session.begin_exchange(&text, pending);
    let model = session.model.clone();
    app.ui.clear_status();
    debug!(stream_id, %model, "Message submitted");

    Some(AppCommand::SpawnChatStream(ChatStreamParams {
        model,
        messages,
        cancel_token,
        stream_id,
    }))
}

fn on_stream_event(app: &mut App, stream_id: u64, event: StreamEvent) {
    let Some(session) = app.chat_session_mut() else {
        debug!(stream_id, "Dropping chat event without a chat session");
        return;
    };
    if !session.is_current_stream(stream_id) {
        debug!(stream_id, "Dropping event from a stale chat stream");
        return;
    }

    match event {
        StreamEvent::TokenChunk(chunk) => session.append_chunk(&chunk),
        StreamEvent::Completion => {
            session.finish_stream();
            debug!(stream_id, "Chat stream completed");
        }
        StreamEvent::StreamError(error) => {
            session.finish_stream();
            app.show_error(error);
        }
        StreamEvent::Progress(_) => {
            debug!(stream_id, "Ignoring progress event on a chat stream");
        }
    }
}

fn attach_context(app: &mut App, path: std::path::PathBuf) -> Option<AppCommand> {
    if !matches!(app.screen, ScreenState::Chat(_)) {
        return wrong_screen(app, "Attaching context");
    }

    let request_id = app.next_id();
    let ScreenState::Chat(session) = &mut app.screen else {
        return None;
    };
    session.pending_context = Some(request_id);
    let session_id = session.id;
    app.ui
        .set_status(format!("Loading context from {}...", path.display()));

    Some(AppCommand::LoadContext(ContextRequest {
        session_id,
        request_id,
        path,
    }))
}

fn on_context_loaded(
    app: &mut App,
    session_id: u64,
    request_id: u64,
    result: Result<ContextAttachment, ContextLoadError>,
) {
    let on_chat_screen = matches!(app.screen, ScreenState::Chat(_));
    let Some(session) = app.chat_session_mut() else {
        debug!(request_id, "Dropping context result without a chat session");
        return;
    };
    if session.id != session_id || session.pending_context != Some(request_id) {
        debug!(request_id, "Dropping stale context result");
        return;
    }
    session.pending_context = None;

    match result {
        Ok(attachment) => {
            info!(source = %attachment.source.display(), files = attachment.files, "Context attached");
            let status = format!("Attached {}", attachment.label());
            session.context_attachment = Some(attachment);
            app.ui.set_status(status);
        }
        Err(err) => {
            session.context_attachment = None;
            if on_chat_screen {
                app.show_error(AppError::ContextLoad(err));
            } else {
                app.ui.set_status(err.to_string());
            }
        }
    }
}

fn cancel_stream(app: &mut App) -> Option<AppCommand> {
    let ScreenState::Chat(session) = &mut app.screen else {
        return wrong_screen(app, "Cancelling a response");
    };
    if session.cancel_stream() {
        app.ui.set_status("Response interrupted");
    }
    None
}
