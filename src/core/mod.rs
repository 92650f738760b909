pub mod app;
pub mod chat_stream;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod model;
pub mod stream_decoder;
