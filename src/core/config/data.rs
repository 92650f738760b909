use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::context::DEFAULT_MAX_CONTEXT_BYTES;

pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";

/// Environment variable the daemon itself reads for its bind address.
pub const HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Daemon address, e.g. "http://gpu-box:11434"
    pub host: Option<String>,
    /// Upper bound on the text a context attachment may carry
    pub max_context_bytes: Option<usize>,
    /// Connect timeout for daemon requests, in seconds
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn max_context_bytes(&self) -> usize {
        self.max_context_bytes
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_CONTEXT_BYTES)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Pick the daemon host: command line, then `OLLAMA_HOST`, then the config
/// file, then [`DEFAULT_HOST`]. Blank values are skipped.
pub fn resolve_host(cli: Option<&str>, env: Option<&str>, config: &Config) -> String {
    [cli, env, config.host.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|host| !host.is_empty())
        .map(with_scheme)
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// `OLLAMA_HOST` is commonly set without a scheme (`0.0.0.0:11434`).
fn with_scheme(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths under the home directory to `~` notation on Unix
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
