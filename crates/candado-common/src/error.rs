//! Error types for Candado
//!
//! This module defines `CandadoError`, the application-specific error enum.
//! Service and store operations return `anyhow::Result`; callers that need to
//! react to a specific condition downcast to `CandadoError`.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum CandadoError {
    #[error("mutex name '{0}' is invalid")]
    InvalidMutexName(String),

    #[error("critical section for '{0}' was interrupted: the cluster lease was given up")]
    WorkInterrupted(String),

    #[error("lease for '{0}' no longer exists")]
    LeaseLost(String),

    #[error("lease store error: {0}")]
    StoreError(String),

    #[error("lock executor unavailable: {0}")]
    ExecutorUnavailable(String),
}

impl CandadoError {
    /// True if this error means the caller's critical section was cut short
    /// because the cluster lease was forcibly released.
    pub fn is_interruption(&self) -> bool {
        matches!(self, CandadoError::WorkInterrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CandadoError::InvalidMutexName("".to_string());
        assert_eq!(format!("{}", err), "mutex name '' is invalid");

        let err = CandadoError::LeaseLost("layout-import".to_string());
        assert_eq!(
            format!("{}", err),
            "lease for 'layout-import' no longer exists"
        );
    }

    #[test]
    fn test_is_interruption() {
        assert!(CandadoError::WorkInterrupted("a".to_string()).is_interruption());
        assert!(!CandadoError::LeaseLost("a".to_string()).is_interruption());
    }

    #[test]
    fn test_downcast_from_anyhow() {
        let err = anyhow::Error::from(CandadoError::WorkInterrupted("a".to_string()));
        let candado = err.downcast_ref::<CandadoError>().unwrap();
        assert!(candado.is_interruption());
    }
}
