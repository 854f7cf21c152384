use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Whether error responses may carry internal failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDetailPolicy {
    detailed: bool,
}

impl ErrorDetailPolicy {
    pub fn new(detailed: bool) -> Self {
        Self { detailed }
    }

    pub fn detailed() -> Self {
        Self::new(true)
    }

    pub fn generic() -> Self {
        Self::new(false)
    }

    /// The error's own message when detail is allowed, `generic` otherwise.
    pub fn public_message(self, error: &dyn StdError, generic: &str) -> String {
        if self.detailed {
            error.to_string()
        } else {
            generic.to_string()
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
