use tracing::{debug, info};

use super::{reject, wrong_screen, AppAction, AppCommand};
use crate::core::app::{App, ChatSession, InputMode, ScreenState};
use crate::core::error::{AppError, ValidationError};
use crate::core::model::{with_catalog, Model};

pub(super) fn handle_models_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SelectModel { name } => select_model(app, name),
        AppAction::RefreshModels => refresh_models(app),
        AppAction::ModelsLoaded { request_id, result } => {
            on_models_loaded(app, request_id, result);
            None
        }
        AppAction::MoveSelection { delta } => {
            if matches!(app.screen, ScreenState::Models) {
                let len = app.models.len();
                app.ui.move_selection(delta, len);
            }
            None
        }
        _ => unreachable!("non-models action routed to models handler"),
    }
}

fn select_model(app: &mut App, name: String) -> Option<AppCommand> {
    if !matches!(app.screen, ScreenState::Models) {
        return wrong_screen(app, "Selecting a model");
    }
    let Some(model) = app.find_model(&name) else {
        return reject(app, ValidationError::UnknownModel(name));
    };
    if !model.installed {
        let err = ValidationError::NotInstalled(model.name.clone());
        return reject(app, err);
    }

    let model_name = model.name.clone();
    let session_id = app.next_id();
    info!(model = %model_name, session_id, "Starting chat session");
    app.screen = ScreenState::Chat(ChatSession::new(session_id, model_name));
    app.ui.set_input_mode(InputMode::Message);
    app.ui.clear_input();
    app.ui.clear_status();
    None
}

fn refresh_models(app: &mut App) -> Option<AppCommand> {
    if !matches!(app.screen, ScreenState::Models) {
        return wrong_screen(app, "Refreshing models");
    }
    let request_id = app.begin_refresh();
    debug!(request_id, "Refreshing model list");
    Some(AppCommand::LoadModels { request_id })
}

fn on_models_loaded(app: &mut App, request_id: u64, result: Result<Vec<Model>, AppError>) {
    if !app.take_refresh(request_id) {
        debug!(request_id, "Dropping stale model listing");
        return;
    }

    match result {
        Ok(installed) => {
            info!(count = installed.len(), "Model list refreshed");
            let selected = app.selected_model().map(|model| model.name.clone());
            app.models = with_catalog(installed);
            match selected.and_then(|name| app.models.iter().position(|m| m.matches(&name))) {
                Some(index) => app.ui.selected_model = index,
                None => app.ui.clamp_selection(app.models.len()),
            }
        }
        Err(error) => {
            if matches!(app.screen, ScreenState::Models) {
                app.show_error(error);
            } else {
                app.ui.set_status(format!("Could not refresh models: {error}"));
            }
        }
    }
}
