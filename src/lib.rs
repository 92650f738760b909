//! ollama-tui is a terminal client for a local Ollama inference daemon.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the daemon's wire payloads and the HTTP transport.
//! - [`core`] owns the session controller, the stream decoder, context
//!   loading, configuration, and the spawned streaming tasks.
//! - [`ui`] renders the screens and runs the event loop that turns key
//!   presses and stream events into controller actions.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! resolves configuration and hands off to [`ui::chat_loop`].

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
