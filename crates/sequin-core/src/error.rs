//! Unified error type for the network reference model
//!
//! [`CoreError`] covers everything that can go wrong while assembling or
//! querying a [`NetworkRef`](crate::NetworkRef). Session-level errors wrap it
//! at their own API boundary.
//!
//! # Example
//!
//! ```ignore
//! use sequin_core::{CoreResult, NetworkBuilder};
//!
//! fn two_bus() -> CoreResult<sequin_core::NetworkRef> {
//!     let mut builder = NetworkBuilder::new("two-bus");
//!     // ... add buses and branches ...
//!     builder.build()
//! }
//! ```

use thiserror::Error;

/// Error type for network reference operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Data validation errors (duplicate ids, bad ratings)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network structure errors (dangling references)
    #[error("Network error: {0}")]
    Network(String),
}

/// Convenience type alias for Results using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::Validation("duplicate branch 3".into());
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("duplicate branch 3"));
    }

    #[test]
    fn test_network_error_display() {
        let err = CoreError::Network("branch 4 references unknown bus 9".into());
        assert_eq!(err.to_string(), "Network error: branch 4 references unknown bus 9");
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> CoreResult<()> {
            Err(CoreError::Network("bus 9 missing".into()))
        }

        fn outer() -> CoreResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(CoreError::Network(_))));
    }
}
