use thiserror::Error;

/// Shown when a failure carries no message of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad or missing URL, caught before any network call.
    #[error("{0}")]
    Validation(String),

    /// The backend answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Backend { message: String },

    #[error("could not reach the download service: {0}")]
    Network(#[from] reqwest::Error),

    /// The job itself reported `status: error` while being polled.
    #[error("{0}")]
    Job(String),

    #[error("could not save the downloaded file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid backend url: {0}")]
    InvalidBackendUrl(String),

    /// Operation requested from a state that does not allow it.
    #[error("{0}")]
    NotReady(String),
}

impl SessionError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Text for the error panel.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
