/// Result alias that carries the custom [`ToolkitError`] type.
pub type Result<T> = std::result::Result<T, ToolkitError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    /// Malformed or missing section, record or field. Parsing aborts for the
    /// file that produced it.
    #[error("line {line}: {message}")]
    Format { line: usize, message: String },
    /// The chart or the requested parameters are not supported by a
    /// transformation. The file is skipped.
    #[error("{0}")]
    Validation(String),
    /// A single note cannot satisfy the grid or margin clamps.
    #[error("{0}")]
    Constraint(String),
    /// Grid lookups need at least one uninherited timing point.
    #[error("no uninherited timing points")]
    NoTimingData,
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A preset file could not be decoded.
    #[error("invalid preset: {0}")]
    Preset(#[from] serde_json::Error),
}

impl ToolkitError {
    pub fn format<T: Into<String>>(line: usize, message: T) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }

    /// Creates a new validation error from the provided message.
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    /// Short label used when reporting failed files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format { .. } => "format",
            Self::Validation(_) => "validation",
            Self::Constraint(_) => "constraint",
            Self::NoTimingData => "timing",
            Self::Io(_) => "io",
            Self::Preset(_) => "preset",
        }
    }
}

impl From<&str> for ToolkitError {
    fn from(value: &str) -> Self {
        Self::validation(value)
    }
}

impl From<String> for ToolkitError {
    fn from(value: String) -> Self {
        Self::Validation(value)
    }
}
