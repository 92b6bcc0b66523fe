//! Error taxonomy shared by every engine component.
//!
//! - `InvalidArgument`: the caller handed us something malformed.
//! - `InsufficientData`: the request is legitimate but there is not enough
//!   data yet (callers usually treat this as "not ready").
//! - `ExternalEvaluation`: the annotation evaluator collaborator failed or
//!   returned unusable data. Never retried inside the engine.

/// Engine errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("external evaluation failed: {0}")]
    ExternalEvaluation(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalEvaluation(msg.into())
    }

    /// True when the error only means "not ready yet".
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::InsufficientData(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_detail() {
        let e = EngineError::insufficient("stddev needs at least 2 values, got 1");
        assert_eq!(
            e.to_string(),
            "insufficient data: stddev needs at least 2 values, got 1"
        );
        assert!(e.is_not_ready());
        assert!(!EngineError::invalid("x").is_not_ready());
    }
}
