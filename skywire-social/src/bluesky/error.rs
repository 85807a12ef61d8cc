use skywire_http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlueskyError {
    /// Bad credentials, no session, or a session response without a token.
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request failed with status {status}: {message}")]
    Request {
        status: u16,
        message: String,
        body: String,
    },
    /// Response JSON missing an expected field or carrying the wrong type.
    #[error("unexpected response shape: {0}")]
    Shape(String),
    /// Malformed identifier, URL or bulk-input line.
    #[error("invalid input: {0}")]
    Input(String),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BlueskyError>;

impl From<HttpError> for BlueskyError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) | HttpError::Build(msg) => BlueskyError::Transport(msg),
            HttpError::Url(msg) => BlueskyError::Input(msg),
            HttpError::Decode(msg, snippet) => {
                BlueskyError::Shape(format!("{msg} (body: {snippet})"))
            }
            HttpError::Api {
                status,
                message,
                body,
            } => BlueskyError::Request {
                status: status.as_u16(),
                message,
                body,
            },
        }
    }
}
