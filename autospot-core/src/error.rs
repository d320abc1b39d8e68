use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The backend answered with a non-success status. `message` is the raw
    /// backend text, shown to the user as is.
    #[error("{message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("no authenticated user")]
    NotAuthenticated,

    #[error("client profile not found")]
    ClientNotFound,

    #[error("more than one client matches {email}")]
    AmbiguousClient { email: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("session storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Commands hand errors to the UI as plain text.
impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_raw_message() {
        let err = Error::Backend {
            status: 409,
            code: Some("23505".into()),
            message: "duplicate key value violates unique constraint".into(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint"
        );
    }
}
