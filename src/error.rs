use std::io;

/// Reasons a record could not be encoded.
///
/// The renderer never hands these to the caller: they end up, formatted as
/// `<kind>: <message>`, in the `exception` field of the fallback line.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Circular reference detected")]
    CircularReference,
    #[error("Object of type '{0}' is not JSON serializable")]
    Unserializable(String),
    #[error("{0}")]
    Strategy(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EncodeError {
    /// Creates an error for a custom default-value strategy that gave up on a value.
    pub fn strategy(message: impl Into<String>) -> Self {
        Self::Strategy(message.into())
    }

    /// Short name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CircularReference => "CircularReference",
            Self::Unserializable(_) => "Unserializable",
            Self::Strategy(_) => "Strategy",
            Self::Io(_) => "Io",
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(error: serde_json::Error) -> Self {
        if error.is_io() {
            Self::Io(error.into())
        } else {
            Self::Strategy(error.to_string())
        }
    }
}

/// Error returned when a severity name or number cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(pub(crate) String);

/// Errors from installing the process-wide logger.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("a global default subscriber has already been installed")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),
    #[cfg(feature = "tracing-log")]
    #[error("unable to bridge `log` records: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
}
