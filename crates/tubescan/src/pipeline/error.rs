use thiserror::Error;

/// A pipeline step failure, classified for retry handling.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// Rate limit, timeout or network hiccup. Retried with backoff up to
    /// the attempt budget.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Unrecoverable content or source problem. Fails the job immediately.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl StepError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(StepError::Transient("429".into()).is_transient());
        assert!(!StepError::Permanent("video removed".into()).is_transient());
    }
}
