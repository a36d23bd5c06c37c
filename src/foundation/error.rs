/// Crate-wide result alias.
pub type ImagegenResult<T> = Result<T, ImagegenError>;

/// Coarse failure class, used to pick process exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Template failed to lex, parse or run.
    Script,
    /// Script data did not marshal into a valid scene.
    Validation,
    /// Rendering failed (missing asset, unknown font, ...).
    Processing,
    /// Filesystem-level failure.
    Io,
}

impl ErrorCategory {
    /// Process exit code for this category.
    ///
    /// Script and validation failures share a code: both mean "bad template".
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Script | Self::Validation => 10,
            Self::Processing => 20,
            Self::Io => 30,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ImagegenError {
    #[error("script error: {0}")]
    Script(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("i/o error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImagegenError {
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Script(_) => ErrorCategory::Script,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Processing(_) | Self::Other(_) => ErrorCategory::Processing,
            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Message without the category prefix, as a script sees it through `pcall`.
    pub fn message(&self) -> String {
        match self {
            Self::Script(msg) | Self::Validation(msg) | Self::Processing(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Prefix script-facing messages with a source location.
    ///
    /// Processing and I/O errors are left untouched.
    pub fn at(self, location: &str) -> Self {
        match self {
            Self::Script(msg) => Self::Script(format!("{location}: {msg}")),
            Self::Validation(msg) => Self::Validation(format!("{location}: {msg}")),
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
