//! Terminal UI layer.
//!
//! - [`chat_loop`]: terminal lifecycle, key handling, and the event loop that
//!   feeds the controller in [`crate::core::app`] and executes its commands.
//! - [`renderer`]: draws the current screen from controller state.
//!
//! This layer presents and captures interaction state; [`crate::core`] owns
//! session logic and daemon coordination.

pub mod chat_loop;
pub mod renderer;
