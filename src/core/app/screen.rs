use tokio_util::sync::CancellationToken;

use super::session::ChatSession;
use crate::core::error::AppError;
use crate::core::stream_decoder::{Progress, ProgressUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Pulling,
    Verifying,
    Done,
    Failed,
}

impl InstallStatus {
    pub fn label(self) -> &'static str {
        match self {
            InstallStatus::Pulling => "Pulling",
            InstallStatus::Verifying => "Verifying",
            InstallStatus::Done => "Done",
            InstallStatus::Failed => "Failed",
        }
    }
}

/// An in-progress model pull.
#[derive(Debug)]
pub struct InstallJob {
    pub model_name: String,
    pub status: InstallStatus,
    pub progress: Progress,
    pub detail: String,
    pub error: Option<String>,
    pub stream_id: u64,
    cancel_token: CancellationToken,
}

impl InstallJob {
    pub fn new(model_name: impl Into<String>, stream_id: u64) -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        (
            Self {
                model_name: model_name.into(),
                status: InstallStatus::Pulling,
                progress: Progress::Indeterminate,
                detail: "starting".to_string(),
                error: None,
                stream_id,
                cancel_token: token.clone(),
            },
            token,
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, InstallStatus::Pulling | InstallStatus::Verifying)
    }

    pub fn apply_progress(&mut self, update: ProgressUpdate) {
        self.status = if update.verifying {
            InstallStatus::Verifying
        } else {
            InstallStatus::Pulling
        };
        self.progress = update.progress;
        self.detail = update.detail;
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// The controller's top-level state. Exactly one screen is active.
#[derive(Debug)]
pub enum ScreenState {
    Models,
    Chat(ChatSession),
    Install(InstallJob),
    Error {
        previous: Box<ScreenState>,
        error: AppError,
    },
}

impl ScreenState {
    pub fn name(&self) -> &'static str {
        match self {
            ScreenState::Models => "models",
            ScreenState::Chat(_) => "chat",
            ScreenState::Install(_) => "install",
            ScreenState::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_updates_track_phase() {
        let (mut job, _token) = InstallJob::new("phi3", 1);
        job.apply_progress(ProgressUpdate {
            detail: "pulling abc".into(),
            verifying: false,
            progress: Progress::Fraction(0.4),
        });
        assert_eq!(job.status, InstallStatus::Pulling);
        assert_eq!(job.progress, Progress::Fraction(0.4));

        job.apply_progress(ProgressUpdate {
            detail: "verifying sha256 digest".into(),
            verifying: true,
            progress: Progress::Indeterminate,
        });
        assert_eq!(job.status, InstallStatus::Verifying);
        assert!(job.is_active());
    }
}
