//! Domain error taxonomy.

use thiserror::Error;

/// Failure of the underlying persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Errors returned by the synchronizer and the normalizer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn device_not_found() -> Self {
        DomainError::NotFound("Device not found".to_string())
    }

    pub fn zone_not_found() -> Self {
        DomainError::NotFound("Zone not found".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        assert_eq!(
            DomainError::device_not_found().to_string(),
            "Not found: Device not found"
        );
        assert_eq!(
            DomainError::Validation("latitude: required".to_string()).to_string(),
            "Validation error: latitude: required"
        );
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: DomainError = StoreError::Unavailable("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_from_sqlx_pool_timeout_is_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_from_sqlx_row_not_found_is_query() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Query(_)));
    }
}
