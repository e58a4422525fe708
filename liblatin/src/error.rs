use std::fmt;

/// Errors raised by the predictor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictError {
    /// `predict` was called before both a dictionary and a layout were set.
    NotInitialized,
    /// The dictionary blob could not be parsed.
    BadDictionary(String),
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictError::NotInitialized => write!(f, "predictor not initialized"),
            PredictError::BadDictionary(msg) => write!(f, "bad prediction dictionary: {}", msg),
        }
    }
}

impl std::error::Error for PredictError {}
