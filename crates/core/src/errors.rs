use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid recommendation config `{config}`: {reason}")]
    InvalidConfig { config: String, reason: String },
    #[error("invalid recommendation block `{block}`: {reason}")]
    InvalidBlock { block: String, reason: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, DomainError};

    #[test]
    fn domain_error_wraps_into_application_error() {
        let app = ApplicationError::from(DomainError::InvalidConfig {
            config: "related-products".to_owned(),
            reason: "decay factor out of range".to_owned(),
        });

        assert!(matches!(app, ApplicationError::Domain(DomainError::InvalidConfig { .. })));
        assert!(app.to_string().contains("related-products"));
    }
}
