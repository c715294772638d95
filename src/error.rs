/// Everything that can end an analysis request early.
///
/// Each variant is terminal for the current request only; the interaction
/// surface stays usable for the next upload.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// No image was supplied with the request.
    #[error("no image was provided")]
    MissingInput,

    /// The upload could not be turned into an RGB image.
    #[error("invalid image format: {0}")]
    InvalidFormat(String),

    /// The model answered with fewer characters than a full analysis needs.
    #[error("analysis seems incomplete ({length} characters)")]
    IncompleteResponse { length: usize },

    /// The call to the hosted model failed.
    #[error("{0}")]
    Transport(String),

    /// Writing or reading the temporary image failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Fieldless tag of an [`AnalysisError`], cheap to copy into outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingInput,
    InvalidFormat,
    IncompleteResponse,
    TransportFailure,
    IoFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "missing_input",
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::IncompleteResponse => "incomplete_response",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::IoFailure => "io_failure",
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MissingInput => ErrorKind::MissingInput,
            AnalysisError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            AnalysisError::IncompleteResponse { .. } => ErrorKind::IncompleteResponse,
            AnalysisError::Transport(_) => ErrorKind::TransportFailure,
            AnalysisError::Io(_) => ErrorKind::IoFailure,
        }
    }

    /// Wraps any model error as a transport failure, keeping its message.
    pub fn transport<E: std::error::Error>(err: E) -> Self {
        AnalysisError::Transport(err.to_string())
    }
}
