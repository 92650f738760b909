use tracing::{debug, info, warn};

use super::{reject, wrong_screen, AppAction, AppCommand};
use crate::core::app::{App, InstallJob, InstallStatus, ScreenState};
use crate::core::chat_stream::PullParams;
use crate::core::error::ValidationError;
use crate::core::model::Model;
use crate::core::stream_decoder::StreamEvent;

pub(super) fn handle_install_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::InstallModel { name } => install_model(app, name),
        AppAction::InstallStreamEvent { stream_id, event } => on_install_event(app, stream_id, event),
        AppAction::CancelInstall => {
            cancel_install(app);
            None
        }
        _ => unreachable!("non-install action routed to install handler"),
    }
}

fn install_model(app: &mut App, name: String) -> Option<AppCommand> {
    if app.install_active() {
        return reject(app, ValidationError::InstallActive);
    }
    if !matches!(app.screen, ScreenState::Models) {
        return wrong_screen(app, "Installing a model");
    }
    let name = name.trim().to_string();
    if name.is_empty() {
        return reject(app, ValidationError::UnknownModel(name));
    }
    if app.find_model(&name).is_some_and(|model| model.installed) {
        return reject(app, ValidationError::AlreadyInstalled(name));
    }

    let stream_id = app.next_id();
    let (job, cancel_token) = InstallJob::new(name.clone(), stream_id);
    info!(model = %name, stream_id, "Installing model");
    app.screen = ScreenState::Install(job);
    app.ui.clear_status();

    Some(AppCommand::SpawnPull(PullParams {
        model: name,
        cancel_token,
        stream_id,
    }))
}

fn on_install_event(app: &mut App, stream_id: u64, event: StreamEvent) -> Option<AppCommand> {
    let ScreenState::Install(job) = &mut app.screen else {
        debug!(stream_id, "Dropping install event outside the install screen");
        return None;
    };
    if job.stream_id != stream_id || !job.is_active() {
        debug!(stream_id, "Dropping event from a stale install stream");
        return None;
    }

    match event {
        StreamEvent::Progress(update) => {
            job.apply_progress(update);
            None
        }
        StreamEvent::Completion => {
            job.status = InstallStatus::Done;
            let name = job.model_name.clone();
            info!(model = %name, "Install finished");
            mark_installed(app, &name);
            app.screen = ScreenState::Models;
            app.ui.set_status(format!("Installed {name}"));
            let request_id = app.begin_refresh();
            Some(AppCommand::LoadModels { request_id })
        }
        StreamEvent::StreamError(error) => {
            job.status = InstallStatus::Failed;
            job.error = Some(error.to_string());
            warn!(
                model = %job.model_name,
                last_status = %job.detail,
                error = ?job.error,
                "Install failed"
            );
            app.screen = ScreenState::Models;
            app.show_error(error);
            None
        }
        StreamEvent::TokenChunk(_) => {
            debug!(stream_id, "Ignoring token chunk on an install stream");
            None
        }
    }
}

fn mark_installed(app: &mut App, name: &str) {
    let index = match app.models.iter().position(|model| model.matches(name)) {
        Some(index) => {
            app.models[index].installed = true;
            index
        }
        None => {
            app.models.insert(0, Model::installed(name));
            0
        }
    };
    app.ui.selected_model = index;
}

fn cancel_install(app: &mut App) {
    let ScreenState::Install(job) = &app.screen else {
        return;
    };
    job.cancel();
    let name = job.model_name.clone();
    info!(model = %name, "Install cancelled");
    app.screen = ScreenState::Models;
    app.ui.set_status(format!("Install of {name} cancelled"));
}
