use thiserror::Error;

/// Errors that can occur in the analyzer library
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Feature extraction error
    #[error("Feature extraction error: {0}")]
    Feature(String),

    /// Detector ensemble error
    #[error("Ensemble error: {0}")]
    Ensemble(String),

    /// Persistence sink error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid state error
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias using AnalyzerError
pub type Result<T> = std::result::Result<T, AnalyzerError>;

impl From<String> for AnalyzerError {
    fn from(s: String) -> Self {
        AnalyzerError::Other(s)
    }
}

impl From<&str> for AnalyzerError {
    fn from(s: &str) -> Self {
        AnalyzerError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzerError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyzerError::Config("contamination out of range".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: contamination out of range"
        );
    }

    #[test]
    fn test_error_from_string() {
        let err: AnalyzerError = "test error".into();
        assert!(matches!(err, AnalyzerError::Other(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AnalyzerError = io_err.into();
        assert!(matches!(err, AnalyzerError::Io(_)));
    }
}
