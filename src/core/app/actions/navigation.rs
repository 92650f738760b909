use tracing::{debug, info};

use super::{wrong_screen, AppAction, AppCommand};
use crate::core::app::{App, InputMode, ScreenState};

pub(super) fn handle_navigation_action(app: &mut App, action: AppAction) -> Option<AppCommand> {
    match action {
        AppAction::SetStatus { message } => {
            app.ui.set_status(message);
            None
        }
        AppAction::ClearStatus => {
            app.ui.clear_status();
            None
        }
        AppAction::GoBack => go_back(app),
        AppAction::Quit => {
            quit(app);
            None
        }
        _ => unreachable!("non-navigation action routed to navigation handler"),
    }
}

fn go_back(app: &mut App) -> Option<AppCommand> {
    match std::mem::replace(&mut app.screen, ScreenState::Models) {
        ScreenState::Chat(mut session) => {
            session.cancel_stream();
            info!(model = %session.model, turns = session.messages.len(), "Leaving chat session");
            app.ui.set_input_mode(InputMode::Message);
            app.ui.clear_status();
            None
        }
        ScreenState::Error { previous, error } => {
            debug!(%error, "Dismissing error screen");
            let previous = *previous;
            if matches!(previous, ScreenState::Chat(_)) {
                app.ui.set_input_mode(InputMode::Message);
            }
            app.screen = previous;
            app.ui.clear_status();
            None
        }
        other => {
            app.screen = other;
            wrong_screen(app, "Going back")
        }
    }
}

fn quit(app: &mut App) {
    app.cancel_background_work();
    info!(screen = app.screen.name(), "Quit requested");
    app.ui.exit_requested = true;
}
