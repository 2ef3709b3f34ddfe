use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebDriverError>;

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("Network error: {0}")]
    Network(String),

    /// Error object returned by the driver (`{"value": {"error": .., "message": ..}}`).
    #[error("WebDriver error (status {status}, {error}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl WebDriverError {
    /// The driver reported that the element or window went away under us.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            WebDriverError::Api { error, .. }
                if error == "stale element reference" || error == "no such window"
        )
    }
}

impl From<reqwest::Error> for WebDriverError {
    fn from(err: reqwest::Error) -> Self {
        WebDriverError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for WebDriverError {
    fn from(err: serde_json::Error) -> Self {
        WebDriverError::Protocol(err.to_string())
    }
}
