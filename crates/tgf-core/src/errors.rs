use std::path::PathBuf;

/// Core error type for the facade.
///
/// Adapter crates map their client errors into this type. Upstream RPC
/// failures keep their platform name and value in [`Error::Rpc`] so the
/// session layer can classify them; everything the session layer decides on
/// its own surfaces as one of the terminal variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No telegram sessions available")]
    PoolExhausted,

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("All sessions deauthorized: {reason}")]
    SessionsDeauthorized { reason: String },

    #[error("Account banned in this channel")]
    ScopeDenied,

    #[error("malformed cursor")]
    MalformedCursor,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("rpc error {code}: {name}")]
    Rpc {
        code: i32,
        name: String,
        value: Option<u32>,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid session file: {path}: {reason}")]
    InvalidSession { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Convenience constructor for upstream RPC failures.
    pub fn rpc(code: i32, name: impl Into<String>, value: Option<u32>) -> Self {
        Self::Rpc {
            code,
            name: name.into(),
            value,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
