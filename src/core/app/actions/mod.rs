mod chat;
mod install;
mod models;
mod navigation;

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::debug;

use super::App;
use crate::core::chat_stream::{ChatStreamParams, PullParams};
use crate::core::context::{ContextAttachment, ContextLoadError};
use crate::core::error::{AppError, ValidationError};
use crate::core::model::Model;
use crate::core::stream_decoder::StreamEvent;

/// Every intent and every background result the controller reacts to.
#[derive(Debug)]
pub enum AppAction {
    SelectModel {
        name: String,
    },
    SendMessage {
        text: String,
    },
    ChatStreamEvent {
        stream_id: u64,
        event: StreamEvent,
    },
    AttachContext {
        path: PathBuf,
    },
    DetachContext,
    ContextLoaded {
        session_id: u64,
        request_id: u64,
        result: Result<ContextAttachment, ContextLoadError>,
    },
    CancelStream,
    RefreshModels,
    ModelsLoaded {
        request_id: u64,
        result: Result<Vec<Model>, AppError>,
    },
    InstallModel {
        name: String,
    },
    InstallStreamEvent {
        stream_id: u64,
        event: StreamEvent,
    },
    CancelInstall,
    MoveSelection {
        delta: isize,
    },
    SetStatus {
        message: String,
    },
    ClearStatus,
    GoBack,
    Quit,
}

#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub session_id: u64,
    pub request_id: u64,
    pub path: PathBuf,
}

/// Side effects requested by a transition, executed by the event loop.
pub enum AppCommand {
    LoadModels { request_id: u64 },
    SpawnChatStream(ChatStreamParams),
    SpawnPull(PullParams),
    LoadContext(ContextRequest),
}

#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppAction>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppAction>) -> Self {
        Self { tx }
    }

    pub fn dispatch(&self, action: AppAction) {
        let _ = self.tx.send(action);
    }
}

pub fn apply_actions(app: &mut App, actions: impl IntoIterator<Item = AppAction>) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for action in actions {
        if let Some(cmd) = apply_action(app, action) {
            commands.push(cmd);
        }
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SendMessage { .. }
        | AppAction::ChatStreamEvent { .. }
        | AppAction::AttachContext { .. }
        | AppAction::DetachContext
        | AppAction::ContextLoaded { .. }
        | AppAction::CancelStream => chat::handle_chat_action(app, action),

        AppAction::SelectModel { .. }
        | AppAction::RefreshModels
        | AppAction::ModelsLoaded { .. }
        | AppAction::MoveSelection { .. } => models::handle_models_action(app, action),

        AppAction::InstallModel { .. }
        | AppAction::InstallStreamEvent { .. }
        | AppAction::CancelInstall => install::handle_install_action(app, action),

        AppAction::SetStatus { .. }
        | AppAction::ClearStatus
        | AppAction::GoBack
        | AppAction::Quit => navigation::handle_navigation_action(app, action),
    }
}

/// Report a rejected intent inline and leave state untouched.
fn reject(app: &mut App, err: ValidationError) -> Option<AppCommand> {
    debug!(screen = app.screen.name(), %err, "Rejected intent");
    app.ui.set_status(err.to_string());
    None
}

fn wrong_screen(app: &mut App, operation: &'static str) -> Option<AppCommand> {
    let screen = app.screen.name();
    reject(app, ValidationError::WrongScreen { operation, screen })
}
