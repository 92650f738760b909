#[cfg(test)]
use crate::core::app::{apply_action, App, AppAction, AppCommand};
#[cfg(test)]
use crate::core::model::Model;

#[cfg(test)]
pub const TEST_HOST: &str = "http://127.0.0.1:11434";

/// An app on the models screen with `llama3` and `mistral:7b` installed and
/// the catalog merged in.
#[cfg(test)]
pub fn create_test_app() -> App {
    let mut app = App::new(TEST_HOST);
    let request_id = match apply_action(&mut app, AppAction::RefreshModels) {
        Some(AppCommand::LoadModels { request_id }) => request_id,
        _ => panic!("expected a model listing request"),
    };
    apply_action(
        &mut app,
        AppAction::ModelsLoaded {
            request_id,
            result: Ok(test_models()),
        },
    );
    app
}

#[cfg(test)]
pub fn test_models() -> Vec<Model> {
    let mut llama = Model::installed("llama3:latest");
    llama.size = Some(4_661_224_676);
    llama.family = Some("llama".into());
    let mistral = Model::installed("mistral:7b");
    vec![llama, mistral]
}
