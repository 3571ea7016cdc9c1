pub type Result<T, E = StatsError> = std::result::Result<T, E>;

/// Everything that can go wrong while gathering, validating, or persisting
/// server stats. All variants are recoverable; callers surface them to the
/// operator and carry on.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("could not reach {endpoint}: {reason}")]
    SourceUnreachable { endpoint: String, reason: String },

    #[error("invalid {field}: {reason}")]
    ValidationFailure { field: &'static str, reason: String },

    #[error("failed to persist {what}: {reason}")]
    PersistenceFailure { what: &'static str, reason: String },

    #[error("change feed closed")]
    SubscriptionFailure,
}

impl StatsError {
    pub(crate) fn unreachable(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnreachable {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl ToString) -> Self {
        Self::ValidationFailure {
            field,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persistence(what: &'static str, reason: impl ToString) -> Self {
        Self::PersistenceFailure {
            what,
            reason: reason.to_string(),
        }
    }
}
