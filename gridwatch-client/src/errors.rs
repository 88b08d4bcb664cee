use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("snapshot version kept changing during pagination")]
    VersionChurn,

    #[error("inconsistent page sequence: {0}")]
    InconsistentSequence(String),
}
