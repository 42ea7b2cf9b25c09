// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Authorization error taxonomy.

use thiserror::Error;

use rolegate_model::VocabularyError;
use rolegate_policy::PolicyError;
use rolegate_store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Missing or invalid parameter. Raised before any repository call.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Permission denied, or an ownership guard rejected the mutation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The repository's uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AuthzError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AuthzError::Forbidden(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AuthzError::Validation(_))
    }
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(msg) => AuthzError::Conflict(msg),
            other => AuthzError::Internal(other.to_string()),
        }
    }
}

impl From<PolicyError> for AuthzError {
    fn from(err: PolicyError) -> Self {
        if err.is_caller_error() {
            AuthzError::Validation(err.to_string())
        } else {
            AuthzError::Internal(err.to_string())
        }
    }
}

impl From<VocabularyError> for AuthzError {
    fn from(err: VocabularyError) -> Self {
        AuthzError::Validation(err.to_string())
    }
}
