pub mod data;
pub mod io;


pub use data::{path_display, resolve_host, Config, DEFAULT_HOST, HOST_ENV};
pub use io::ConfigError;
