//! Event polling, dispatching, and UI rendering loop.
//!
//! Terminal input, stream events and background results each arrive on their
//! own channel. The loop applies them to the [`App`] it owns, executes the
//! [`AppCommand`]s that come back, and redraws.

use std::{error::Error, time::Duration};

use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::client::TransportClient;
use crate::api::models::installed_models;
use crate::core::app::{
    apply_actions, App, AppAction, AppActionDispatcher, AppCommand, ContextRequest, InputMode,
    ScreenState,
};
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamReceiver};
use crate::core::context::ContextLoader;
use crate::ui::renderer::ui;

use super::keybindings::handle_key;
use super::lifecycle::Tui;

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
}

/// Everything commands need to reach the outside world.
#[derive(Clone)]
pub(crate) struct Executor {
    client: TransportClient,
    streams: ChatStreamService,
    loader: ContextLoader,
    dispatcher: AppActionDispatcher,
}

impl Executor {
    pub(crate) fn new(
        client: TransportClient,
        streams: ChatStreamService,
        loader: ContextLoader,
        dispatcher: AppActionDispatcher,
    ) -> Self {
        Self {
            client,
            streams,
            loader,
            dispatcher,
        }
    }

    pub(crate) fn execute(&self, command: AppCommand) {
        match command {
            AppCommand::LoadModels { request_id } => {
                spawn_model_loader(self.client.clone(), self.dispatcher.clone(), request_id)
            }
            AppCommand::SpawnChatStream(params) => self.streams.spawn_chat(params),
            AppCommand::SpawnPull(params) => self.streams.spawn_pull(params),
            AppCommand::LoadContext(request) => {
                spawn_context_loader(self.loader, self.dispatcher.clone(), request)
            }
        }
    }
}

fn spawn_model_loader(client: TransportClient, dispatcher: AppActionDispatcher, request_id: u64) {
    tokio::spawn(async move {
        let result = client.list_models().await.map(installed_models);
        if let Err(err) = &result {
            debug!(request_id, %err, "Model listing failed");
        }
        dispatcher.dispatch(AppAction::ModelsLoaded { request_id, result });
    });
}

fn spawn_context_loader(
    loader: ContextLoader,
    dispatcher: AppActionDispatcher,
    request: ContextRequest,
) {
    tokio::spawn(async move {
        let ContextRequest {
            session_id,
            request_id,
            path,
        } = request;
        let result = loader.load(path).await;
        dispatcher.dispatch(AppAction::ContextLoaded {
            session_id,
            request_id,
            result,
        });
    });
}

/// Turn tagged stream messages into controller actions, one per event and in
/// arrival order. Staleness is the controller's call.
pub(crate) fn stream_action(message: StreamMessage, stream_id: u64) -> AppAction {
    match message {
        StreamMessage::Chat(event) => AppAction::ChatStreamEvent { stream_id, event },
        StreamMessage::Install(event) => AppAction::InstallStreamEvent { stream_id, event },
    }
}

fn drain_stream_updates(first: (StreamMessage, u64), rx: &mut StreamReceiver) -> Vec<AppAction> {
    let mut actions = vec![stream_action(first.0, first.1)];
    while let Ok((message, stream_id)) = rx.try_recv() {
        actions.push(stream_action(message, stream_id));
    }
    actions
}

fn drain_action_queue(first: AppAction, rx: &mut mpsc::UnboundedReceiver<AppAction>) -> Vec<AppAction> {
    let mut actions = vec![first];
    while let Ok(action) = rx.try_recv() {
        actions.push(action);
    }
    actions
}

pub(crate) fn sanitize_pasted_text(text: &str) -> String {
    let without_crlf = text.replace("\r\n", "\n");
    let without_cr = without_crlf.replace('\r', "\n");
    let expanded_tabs = without_cr.replace('\t', "    ");
    expanded_tabs
        .chars()
        .filter(|&c| c == '\n' || !c.is_control())
        .collect()
}

/// Paste goes straight into whichever text input is showing.
pub(crate) fn handle_paste_event(app: &mut App, text: &str) {
    let accepts_input = match &app.screen {
        ScreenState::Chat(_) => true,
        ScreenState::Models => app.ui.input_mode == InputMode::PullName,
        _ => false,
    };
    if !accepts_input {
        return;
    }

    let mut sanitized = sanitize_pasted_text(text);
    if app.ui.input_mode != InputMode::Message {
        // Paths and model names are single-line.
        sanitized = sanitized.replace('\n', "");
    }
    if sanitized.is_empty() {
        return;
    }
    app.ui.apply_textarea_edit(|ta| {
        ta.insert_str(sanitized);
    });
}

pub(crate) fn process_ui_event(app: &mut App, event: UiEvent) -> Vec<AppAction> {
    match event {
        UiEvent::Crossterm(Event::Key(key)) if key.kind == KeyEventKind::Press => {
            handle_key(app, key)
        }
        UiEvent::Crossterm(Event::Paste(text)) => {
            handle_paste_event(app, &text);
            Vec::new()
        }
        UiEvent::Crossterm(_) => Vec::new(),
    }
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        continue;
                    }
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

fn apply_and_execute(app: &mut App, executor: &Executor, actions: Vec<AppAction>) {
    if actions.is_empty() {
        return;
    }
    for command in apply_actions(app, actions) {
        executor.execute(command);
    }
}

pub async fn run_event_loop(
    app: &mut App,
    terminal: &mut Tui,
    client: TransportClient,
    loader: ContextLoader,
) -> Result<(), Box<dyn Error>> {
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppAction>();
    let dispatcher = AppActionDispatcher::new(action_tx);
    let (streams, mut stream_rx) = ChatStreamService::new(client.clone());
    let executor = Executor::new(client, streams, loader, dispatcher);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let event_reader_handle = spawn_event_reader(event_tx);

    apply_and_execute(app, &executor, vec![AppAction::RefreshModels]);

    let result = loop {
        if let Err(err) = terminal.draw(|f| ui(f, app)) {
            break Err(err.into());
        }

        let actions = tokio::select! {
            Some(event) = event_rx.recv() => {
                // Each key sees the state the previous one produced.
                let actions = process_ui_event(app, event);
                apply_and_execute(app, &executor, actions);
                while let Ok(event) = event_rx.try_recv() {
                    let actions = process_ui_event(app, event);
                    apply_and_execute(app, &executor, actions);
                }
                Vec::new()
            }
            Some(update) = stream_rx.recv() => drain_stream_updates(update, &mut stream_rx),
            Some(action) = action_rx.recv() => drain_action_queue(action, &mut action_rx),
            else => break Ok(()),
        };
        apply_and_execute(app, &executor, actions);

        if app.ui.exit_requested {
            info!("Exiting");
            break Ok(());
        }
    };

    event_reader_handle.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::apply_action;
    use crate::core::context::ContextAttachment;
    use crate::core::error::AppError;
    use crate::core::stream_decoder::StreamEvent;
    use crate::utils::test_utils::create_test_app;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::fs;
    use tokio::net::TcpListener;

    fn executor() -> (Executor, mpsc::UnboundedReceiver<AppAction>, StreamReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = TransportClient::new("http://127.0.0.1:9", None).expect("client");
        let (streams, stream_rx) = ChatStreamService::new(client.clone());
        (
            Executor::new(client, streams, ContextLoader::default(), AppActionDispatcher::new(tx)),
            rx,
            stream_rx,
        )
    }

    #[test]
    fn sanitize_paste_text_removes_control_characters() {
        assert_eq!(sanitize_pasted_text("a\r\nb\tc\u{7}"), "a\nb    c");
    }

    #[test]
    fn paste_into_context_path_is_single_line() {
        let mut app = create_test_app();
        apply_action(
            &mut app,
            AppAction::SelectModel {
                name: "llama3".into(),
            },
        );
        app.ui.set_input_mode(InputMode::ContextPath);
        handle_paste_event(&mut app, "/tmp/notes\n");
        assert_eq!(app.ui.input_text(), "/tmp/notes");
    }

    #[test]
    fn paste_is_ignored_on_the_models_list() {
        let mut app = create_test_app();
        handle_paste_event(&mut app, "llama3");
        assert!(app.ui.input_text().is_empty());
    }

    #[tokio::test]
    async fn stream_updates_become_actions_in_order() {
        let client = TransportClient::new("http://127.0.0.1:9", None).expect("client");
        let (streams, mut stream_rx) = ChatStreamService::new(client);

        streams.send_for_test(StreamMessage::Chat(StreamEvent::TokenChunk("Hel".into())), 42);
        streams.send_for_test(StreamMessage::Chat(StreamEvent::TokenChunk("lo".into())), 42);
        streams.send_for_test(StreamMessage::Install(StreamEvent::Completion), 7);

        let first = stream_rx.recv().await.unwrap();
        let actions = drain_stream_updates(first, &mut stream_rx);
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            AppAction::ChatStreamEvent { stream_id: 42, event: StreamEvent::TokenChunk(t) } if t == "Hel"
        ));
        assert!(matches!(
            &actions[1],
            AppAction::ChatStreamEvent { stream_id: 42, event: StreamEvent::TokenChunk(t) } if t == "lo"
        ));
        assert!(matches!(
            &actions[2],
            AppAction::InstallStreamEvent { stream_id: 7, event: StreamEvent::Completion }
        ));
    }

    #[tokio::test]
    async fn context_command_reports_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "facts\n").unwrap();

        let (executor, mut rx, _stream_rx) = executor();
        executor.execute(AppCommand::LoadContext(ContextRequest {
            session_id: 3,
            request_id: 4,
            path: file.clone(),
        }));

        match rx.recv().await.unwrap() {
            AppAction::ContextLoaded {
                session_id: 3,
                request_id: 4,
                result: Ok(ContextAttachment { source, files, .. }),
            } => {
                assert_eq!(source, file);
                assert_eq!(files, 1);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn model_listing_failure_reports_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = TransportClient::new(format!("http://{addr}"), None).expect("client");
        spawn_model_loader(client, AppActionDispatcher::new(tx), 11);

        match rx.recv().await.unwrap() {
            AppAction::ModelsLoaded {
                request_id: 11,
                result: Err(AppError::Connection(_)),
            } => {}
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn key_events_route_through_keybindings() {
        let mut app = create_test_app();
        let actions = process_ui_event(
            &mut app,
            UiEvent::Crossterm(Event::Key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE))),
        );
        assert!(matches!(actions.as_slice(), [AppAction::RefreshModels]));

        let actions = process_ui_event(&mut app, UiEvent::Crossterm(Event::FocusGained));
        assert!(actions.is_empty());
    }
}
