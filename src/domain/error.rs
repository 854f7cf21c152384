use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("invalid date range: {message}")]
    DateRange { message: String },
    #[error("unknown {kind} `{value}`")]
    Unknown { kind: &'static str, value: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn date_range(message: impl Into<String>) -> Self {
        Self::DateRange {
            message: message.into(),
        }
    }

    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::Unknown {
            kind,
            value: value.into(),
        }
    }
}
