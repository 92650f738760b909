//! Interactive session: terminal setup, the event loop, and teardown.

mod event_loop;
mod keybindings;
mod lifecycle;

use std::error::Error;

use tracing::info;

use crate::api::client::TransportClient;
use crate::core::app::App;
use crate::core::config::Config;
use crate::core::context::ContextLoader;

use self::event_loop::run_event_loop;
use self::lifecycle::{restore_terminal, setup_terminal};

pub async fn run_app(host: String, config: &Config) -> Result<(), Box<dyn Error>> {
    info!(%host, "Starting session");
    let client = TransportClient::new(host.clone(), config.connect_timeout())?;
    let loader = ContextLoader::new(config.max_context_bytes());
    let mut app = App::new(host);

    let mut terminal = setup_terminal()?;
    let result = run_event_loop(&mut app, &mut terminal, client, loader).await;
    app.cancel_background_work();
    restore_terminal(&mut terminal)?;

    result
}
