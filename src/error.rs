use thiserror::Error;

/// Everything that can go wrong between the page and the host.
///
/// Configuration errors ([`BridgeError::MissingScript`],
/// [`BridgeError::MissingDatabase`], [`BridgeError::MissingFile`]) are always
/// returned synchronously from the call that caused them. The remaining
/// variants describe asynchronous failures; they are handed to the failure
/// callback when one was supplied, and raised out of the platform event that
/// fired them otherwise.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no script name provided for the host call")]
    MissingScript,

    #[error(
        "host calls are unavailable because the database name has not been set; \
         pass it through Bridge::configure, set the \"db\" query parameter in the \
         web viewer address, or name it on the request"
    )]
    MissingDatabase,

    #[error("no file specified for script load")]
    MissingFile,

    #[error("load failure for '{file}'")]
    LoadFailure { file: String },

    #[error("timed out loading '{file}' after {timeout_ms}ms")]
    LoadTimeout { file: String, timeout_ms: u64 },

    #[error("no response from host before timeout ({timeout_ms}ms)")]
    ResponseTimeout { timeout_ms: u64 },

    /// A page primitive (link activation, script injection) failed.
    #[error("platform error: {0}")]
    Platform(String),

    /// The awaiting side of [`crate::Bridge::call`] lost its callbacks
    /// without either of them running.
    #[cfg(feature = "tokio")]
    #[error("host call was dropped before it resolved")]
    Abandoned,

    #[cfg(feature = "config")]
    #[error("invalid bridge config: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for errors caused by how the bridge or request was set up, as
    /// opposed to something the host or platform did at runtime.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BridgeError::MissingScript | BridgeError::MissingDatabase | BridgeError::MissingFile
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BridgeError::LoadTimeout { .. } | BridgeError::ResponseTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Receives the error of a failed load or host call.
pub type FailureCallback = Box<dyn FnOnce(BridgeError)>;
