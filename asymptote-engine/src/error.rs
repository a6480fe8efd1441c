use thiserror::Error;

/// A construct that has no modelling rule.
///
/// Recoverable: the analysis driver degrades the affected function to
/// `Unknown` and keeps going with the rest of the module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported construct: {construct}")]
pub struct UnsupportedConstruct {
    pub construct: String,
}

impl UnsupportedConstruct {
    pub fn new(construct: impl Into<String>) -> Self {
        UnsupportedConstruct {
            construct: construct.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedConstruct),
    #[error("analysis cancelled")]
    Cancelled,
}

/// Errors raised while reading Big-O notation strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("invalid complexity notation: {0}")]
    Syntax(String),
    #[error("invalid exponent: {0}")]
    InvalidExponent(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("malformed engine configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_construct() {
        let err = AnalysisError::from(UnsupportedConstruct::new("mutual recursion"));
        assert_eq!(err.to_string(), "unsupported construct: mutual recursion");
    }
}
