use super::types::ConclaveError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ConclaveError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            ConclaveError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            ConclaveError::Executor(_) => ErrorClassification {
                error_type: "ExecutorError",
                retryable: true,
            },
            ConclaveError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ConclaveError::Persistence(_) => ErrorClassification {
                error_type: "PersistenceError",
                retryable: true,
            },
            ConclaveError::Git(_) => ErrorClassification {
                error_type: "GitError",
                retryable: true,
            },
            ConclaveError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            ConclaveError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },

            // Non-retryable errors: retrying cannot change the outcome
            ConclaveError::InvalidTransition(_) => ErrorClassification {
                error_type: "InvalidTransitionError",
                retryable: false,
            },
            ConclaveError::NotFound(_) => ErrorClassification {
                error_type: "NotFoundError",
                retryable: false,
            },
            ConclaveError::Expired(_) => ErrorClassification {
                error_type: "ExpiredError",
                retryable: false,
            },
            ConclaveError::NoCandidate(_) => ErrorClassification {
                error_type: "NoCandidateError",
                retryable: false,
            },
            ConclaveError::NotVersioned(_) => ErrorClassification {
                error_type: "NotVersionedError",
                retryable: false,
            },
            ConclaveError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ConclaveError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            ConclaveError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let err = ConclaveError::Timeout("executor exceeded 5000ms".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "TimeoutError");
    }

    #[test]
    fn test_invalid_transition_not_retryable() {
        let err = ConclaveError::InvalidTransition("running -> running".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.error_type, "InvalidTransitionError");
    }

    #[test]
    fn test_expired_not_retryable() {
        let err = ConclaveError::Expired("suspension past ttl".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_no_candidate_not_retryable() {
        let err = ConclaveError::NoCandidate("no idle worker".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_not_versioned_not_retryable() {
        let err = ConclaveError::NotVersioned("/tmp/scratch".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_network_error_retryable() {
        let err = ConclaveError::Network("connection refused".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_persistence_retryable() {
        let err = ConclaveError::Persistence("database is locked".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_executor_retryable() {
        let err = ConclaveError::Executor("upstream 503".into());
        assert!(err.classify().retryable);
    }
}
