//! Key handling per screen.
//!
//! Keys edit the local text input directly; everything else is turned into
//! [`AppAction`]s for the controller.

use std::path::PathBuf;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::{Input as TAInput, Key as TAKey};

use crate::core::app::{App, AppAction, InputMode, ScreenState};
use crate::core::context::expand_home;

pub fn handle_key(app: &mut App, key: KeyEvent) -> Vec<AppAction> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return vec![AppAction::Quit];
    }

    match app.screen {
        ScreenState::Models => handle_models_key(app, key),
        ScreenState::Chat(_) => handle_chat_key(app, key),
        ScreenState::Install(_) => match key.code {
            KeyCode::Esc => vec![AppAction::CancelInstall],
            KeyCode::Char('q') => vec![AppAction::Quit],
            _ => Vec::new(),
        },
        ScreenState::Error { .. } => match key.code {
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Enter => vec![AppAction::GoBack],
            KeyCode::Char('q') => vec![AppAction::Quit],
            _ => Vec::new(),
        },
    }
}

fn handle_models_key(app: &mut App, key: KeyEvent) -> Vec<AppAction> {
    if app.ui.input_mode == InputMode::PullName {
        return match key.code {
            KeyCode::Esc => {
                app.ui.set_input_mode(InputMode::Message);
                vec![AppAction::ClearStatus]
            }
            KeyCode::Enter => {
                let name = app.ui.take_input();
                app.ui.set_input_mode(InputMode::Message);
                vec![AppAction::ClearStatus, AppAction::InstallModel { name }]
            }
            _ => {
                edit_input(app, &key);
                Vec::new()
            }
        };
    }

    let selected = app.selected_model().map(|model| model.name.clone());
    match key.code {
        KeyCode::Char('q') => vec![AppAction::Quit],
        KeyCode::Char('r') => vec![AppAction::RefreshModels],
        KeyCode::Up | KeyCode::Char('k') => vec![AppAction::MoveSelection { delta: -1 }],
        KeyCode::Down | KeyCode::Char('j') => vec![AppAction::MoveSelection { delta: 1 }],
        KeyCode::Enter => selected
            .map(|name| vec![AppAction::SelectModel { name }])
            .unwrap_or_default(),
        KeyCode::Char('i') => selected
            .map(|name| vec![AppAction::InstallModel { name }])
            .unwrap_or_default(),
        KeyCode::Char('p') => {
            app.ui.set_input_mode(InputMode::PullName);
            vec![AppAction::SetStatus {
                message: "Model to pull (Enter to start, Esc to cancel)".into(),
            }]
        }
        _ => Vec::new(),
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) -> Vec<AppAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Char('o') if ctrl => {
            let mode = match app.ui.input_mode {
                InputMode::ContextPath => InputMode::Message,
                _ => InputMode::ContextPath,
            };
            app.ui.set_input_mode(mode);
            Vec::new()
        }
        KeyCode::Esc => {
            if app.ui.input_mode == InputMode::ContextPath {
                app.ui.set_input_mode(InputMode::Message);
                Vec::new()
            } else if app.is_streaming() {
                vec![AppAction::CancelStream]
            } else {
                vec![AppAction::GoBack]
            }
        }
        KeyCode::Enter if alt || key.modifiers.contains(KeyModifiers::SHIFT) => {
            if app.ui.input_mode == InputMode::Message {
                app.ui.apply_textarea_edit(|ta| ta.insert_newline());
            }
            Vec::new()
        }
        KeyCode::Enter => match app.ui.input_mode {
            InputMode::ContextPath => {
                let raw = app.ui.take_input();
                app.ui.set_input_mode(InputMode::Message);
                let raw = raw.trim();
                if raw.is_empty() {
                    vec![AppAction::DetachContext]
                } else {
                    vec![AppAction::AttachContext {
                        path: expand_home(&PathBuf::from(raw)),
                    }]
                }
            }
            _ => {
                let text = app.ui.input_text();
                // Keep the draft if the controller is going to refuse it.
                if !app.is_streaming() && !text.trim().is_empty() {
                    app.ui.clear_input();
                }
                vec![AppAction::SendMessage { text }]
            }
        },
        _ => {
            edit_input(app, &key);
            Vec::new()
        }
    }
}

fn edit_input(app: &mut App, key: &KeyEvent) {
    match key.code {
        KeyCode::Delete => app.ui.apply_textarea_edit(|ta| {
            ta.input_without_shortcuts(TAInput {
                key: TAKey::Delete,
                ctrl: false,
                alt: false,
                shift: false,
            });
        }),
        _ => {
            let input = TAInput::from(*key);
            app.ui.apply_textarea_edit(|ta| {
                ta.input(input);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::apply_action;
    use crate::utils::test_utils::create_test_app;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert!(handle_key(app, press(KeyCode::Char(c))).is_empty());
        }
    }

    fn chat_app() -> App {
        let mut app = create_test_app();
        apply_action(
            &mut app,
            AppAction::SelectModel {
                name: "llama3".into(),
            },
        );
        app
    }

    #[test]
    fn models_screen_navigation() {
        let mut app = create_test_app();
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Down)).as_slice(),
            [AppAction::MoveSelection { delta: 1 }]
        ));
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Char('r'))).as_slice(),
            [AppAction::RefreshModels]
        ));
        match handle_key(&mut app, press(KeyCode::Enter)).as_slice() {
            [AppAction::SelectModel { name }] => assert_eq!(name, "llama3:latest"),
            other => panic!("unexpected actions: {other:?}"),
        }
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Char('q'))).as_slice(),
            [AppAction::Quit]
        ));
    }

    #[test]
    fn pull_prompt_collects_a_model_name() {
        let mut app = create_test_app();
        handle_key(&mut app, press(KeyCode::Char('p')));
        assert_eq!(app.ui.input_mode, InputMode::PullName);

        // 'q' is text here, not quit.
        type_text(&mut app, "qwen2");
        match handle_key(&mut app, press(KeyCode::Enter)).as_slice() {
            [AppAction::ClearStatus, AppAction::InstallModel { name }] => assert_eq!(name, "qwen2"),
            other => panic!("unexpected actions: {other:?}"),
        }
        assert_eq!(app.ui.input_mode, InputMode::Message);
        assert!(app.ui.input_text().is_empty());
    }

    #[test]
    fn enter_sends_and_clears_the_draft() {
        let mut app = chat_app();
        type_text(&mut app, "hello");
        match handle_key(&mut app, press(KeyCode::Enter)).as_slice() {
            [AppAction::SendMessage { text }] => assert_eq!(text, "hello"),
            other => panic!("unexpected actions: {other:?}"),
        }
        assert!(app.ui.input_text().is_empty());
    }

    #[test]
    fn draft_survives_while_streaming() {
        let mut app = chat_app();
        apply_action(
            &mut app,
            AppAction::SendMessage {
                text: "first".into(),
            },
        );
        type_text(&mut app, "next");
        handle_key(&mut app, press(KeyCode::Enter));
        assert_eq!(app.ui.input_text(), "next");

        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Esc)).as_slice(),
            [AppAction::CancelStream]
        ));
    }

    #[test]
    fn esc_when_idle_goes_back() {
        let mut app = chat_app();
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Esc)).as_slice(),
            [AppAction::GoBack]
        ));
    }

    #[test]
    fn context_path_prompt() {
        let mut app = chat_app();
        handle_key(&mut app, ctrl('o'));
        assert_eq!(app.ui.input_mode, InputMode::ContextPath);
        type_text(&mut app, "notes.md");
        match handle_key(&mut app, press(KeyCode::Enter)).as_slice() {
            [AppAction::AttachContext { path }] => assert_eq!(path, &PathBuf::from("notes.md")),
            other => panic!("unexpected actions: {other:?}"),
        }
        assert_eq!(app.ui.input_mode, InputMode::Message);

        handle_key(&mut app, ctrl('o'));
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Enter)).as_slice(),
            [AppAction::DetachContext]
        ));
    }

    #[test]
    fn ctrl_c_quits_everywhere() {
        let mut app = chat_app();
        assert!(matches!(
            handle_key(&mut app, ctrl('c')).as_slice(),
            [AppAction::Quit]
        ));
        let mut app = create_test_app();
        assert!(matches!(
            handle_key(&mut app, ctrl('c')).as_slice(),
            [AppAction::Quit]
        ));
    }

    #[test]
    fn install_and_error_screens() {
        let mut app = create_test_app();
        apply_action(
            &mut app,
            AppAction::InstallModel {
                name: "phi3".into(),
            },
        );
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Esc)).as_slice(),
            [AppAction::CancelInstall]
        ));

        let mut app = create_test_app();
        app.show_error(crate::core::error::AppError::Connection("refused".into()));
        assert!(matches!(
            handle_key(&mut app, press(KeyCode::Char('b'))).as_slice(),
            [AppAction::GoBack]
        ));
        assert!(handle_key(&mut app, press(KeyCode::Char('x'))).is_empty());
    }
}
