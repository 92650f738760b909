//! Session and navigation controller.
//!
//! [`App`] owns the active [`ScreenState`], the model listing, and the UI
//! bookkeeping the renderer needs. All mutation goes through
//! [`actions::apply_action`], which the event loop calls from a single task;
//! background work reports back as further actions.

pub mod actions;
pub mod screen;
pub mod session;
pub mod ui_state;


pub use actions::{
    apply_action, apply_actions, AppAction, AppActionDispatcher, AppCommand, ContextRequest,
};
pub use screen::{InstallJob, InstallStatus, ScreenState};
pub use session::{ChatSession, PendingStream};
pub use ui_state::{InputMode, UiState};

use tracing::{info, warn};

use crate::core::error::AppError;
use crate::core::model::Model;

pub struct App {
    pub screen: ScreenState,
    pub models: Vec<Model>,
    pub host: String,
    pub ui: UiState,
    next_id: u64,
    pending_refresh: Option<u64>,
}

impl App {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            screen: ScreenState::Models,
            models: Vec::new(),
            host: host.into(),
            ui: UiState::new(),
            next_id: 0,
            pending_refresh: None,
        }
    }

    /// Ids for streams, sessions and requests share one counter so a stale id
    /// can never collide with a live one.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn chat_session(&self) -> Option<&ChatSession> {
        match &self.screen {
            ScreenState::Chat(session) => Some(session),
            ScreenState::Error { previous, .. } => match previous.as_ref() {
                ScreenState::Chat(session) => Some(session),
                _ => None,
            },
            _ => None,
        }
    }

    /// The chat session, whether it is on screen or carried by the error
    /// screen.
    pub fn chat_session_mut(&mut self) -> Option<&mut ChatSession> {
        match &mut self.screen {
            ScreenState::Chat(session) => Some(session),
            ScreenState::Error { previous, .. } => match previous.as_mut() {
                ScreenState::Chat(session) => Some(session),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn install_job(&self) -> Option<&InstallJob> {
        match &self.screen {
            ScreenState::Install(job) => Some(job),
            _ => None,
        }
    }

    pub fn install_active(&self) -> bool {
        self.install_job().is_some_and(InstallJob::is_active)
    }

    pub fn is_streaming(&self) -> bool {
        self.chat_session().is_some_and(ChatSession::is_streaming)
    }

    pub fn selected_model(&self) -> Option<&Model> {
        self.models.get(self.ui.selected_model)
    }

    pub fn find_model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.matches(name))
    }

    /// Start a listing request, superseding any earlier one.
    pub(crate) fn begin_refresh(&mut self) -> u64 {
        let request_id = self.next_id();
        self.pending_refresh = Some(request_id);
        self.ui.models_loading = true;
        request_id
    }

    /// Whether `request_id` is the latest listing request; clears it if so.
    pub(crate) fn take_refresh(&mut self, request_id: u64) -> bool {
        if self.pending_refresh == Some(request_id) {
            self.pending_refresh = None;
            self.ui.models_loading = false;
            true
        } else {
            false
        }
    }

    /// Move to the error screen, remembering the current screen for return.
    /// A live chat stream is terminated first with its partial content kept,
    /// unless the failure is a context load, which leaves the stream running
    /// in the carried session.
    pub fn show_error(&mut self, error: AppError) {
        if let ScreenState::Error { error: shown, .. } = &self.screen {
            warn!(%error, shown = %shown, "Error while the error screen is open");
            self.ui.set_status(error.to_string());
            return;
        }

        if let ScreenState::Chat(session) = &mut self.screen {
            if !matches!(error, AppError::ContextLoad(_)) {
                session.cancel_stream();
            }
        }
        info!(screen = self.screen.name(), %error, "Showing error screen");
        self.ui.clear_status();
        let previous = std::mem::replace(&mut self.screen, ScreenState::Models);
        self.screen = ScreenState::Error {
            previous: Box::new(previous),
            error,
        };
    }

    /// Cancel whatever is streaming, on any screen.
    pub fn cancel_background_work(&mut self) {
        if let Some(session) = self.chat_session_mut() {
            session.cancel_stream();
            session.pending_context = None;
        }
        if let ScreenState::Install(job) = &self.screen {
            job.cancel();
        }
        self.pending_refresh = None;
        self.ui.models_loading = false;
    }
}
