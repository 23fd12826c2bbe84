//! Annotation error types
//!
//! Every fault raised below the public operations is converted into one of
//! these before it leaves the crate.

use thiserror::Error;

use crate::engine::EngineError;

/// Annotation operation error
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Caller contract violation (unbound page, malformed input)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation failed while building a result
    #[error("Out of memory")]
    OutOfMemory,

    /// The engine raised a fault during a scan or mutation
    #[error("Engine fault: {0}")]
    EngineFault(String),

    /// No annotation matched the requested geometry or position
    #[error("No matching annotation")]
    NotFound,

    /// The page has no native annotation layer
    #[error("Page has no annotation layer")]
    NotPdf,
}

/// Result type alias for annotation operations
pub type Result<T> = std::result::Result<T, AnnotationError>;

impl From<EngineError> for AnnotationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::PageNotLoaded(page) => {
                AnnotationError::InvalidArgument(format!("page {} is not loaded", page))
            }
            EngineError::OutOfMemory => AnnotationError::OutOfMemory,
            EngineError::Fault(message) => AnnotationError::EngineFault(message),
            other => AnnotationError::EngineFault(other.to_string()),
        }
    }
}

impl From<std::collections::TryReserveError> for AnnotationError {
    fn from(_: std::collections::TryReserveError) -> Self {
        AnnotationError::OutOfMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_mapping() {
        assert!(matches!(
            AnnotationError::from(EngineError::PageNotLoaded(3)),
            AnnotationError::InvalidArgument(_)
        ));
        assert!(matches!(
            AnnotationError::from(EngineError::OutOfMemory),
            AnnotationError::OutOfMemory
        ));
        assert!(matches!(
            AnnotationError::from(EngineError::AnnotationGone),
            AnnotationError::EngineFault(_)
        ));
        let err = AnnotationError::from(EngineError::Fault("boom".into()));
        assert_eq!(err.to_string(), "Engine fault: boom");
    }
}
