use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubdubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed subtitle at line {line}: {reason}")]
    MalformedSubtitle { line: usize, reason: String },

    #[error("No valid audio clips to assemble for {0}")]
    NoValidClips(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Batch size mismatch: expected {expected} entries, got {actual}")]
    BatchMismatch { expected: usize, actual: usize },

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl SubdubError {
    pub fn malformed<S: Into<String>>(line: usize, reason: S) -> Self {
        Self::MalformedSubtitle {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SubdubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_carries_line() {
        let err = SubdubError::malformed(7, "missing timing line");
        assert_eq!(
            err.to_string(),
            "Malformed subtitle at line 7: missing timing line"
        );
    }
}
