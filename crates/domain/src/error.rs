/// Shared error type used across all Call Session Core crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport: {status:?} {reason}")]
    Transport {
        status: Option<u16>,
        reason: String,
    },

    #[error("parse: {preview}")]
    Parse { preview: String },

    #[error("config: {0}")]
    Config(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transport(status: Option<u16>, reason: impl Into<String>) -> Self {
        Error::Transport {
            status,
            reason: reason.into(),
        }
    }

    pub fn parse(preview: impl Into<String>) -> Self {
        let mut preview = preview.into();
        preview.truncate(200);
        Error::Parse { preview }
    }
}
