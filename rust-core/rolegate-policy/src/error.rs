// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Policy error types for Rolegate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    /// No rule list is declared for the action.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The action exists but no rule matched the context and it has no fallback.
    #[error("no matching configuration for action '{0}'")]
    NoMatchingRule(String),

    /// A permission template referenced a context field the caller did not supply.
    #[error("missing value for placeholder '{{{placeholder}}}' in '{template}'")]
    MissingPlaceholder {
        placeholder: String,
        template: String,
    },

    /// A policy document parsed but violates a load-time rule.
    #[error("invalid policy document '{document}': {reason}")]
    InvalidDocument { document: String, reason: String },

    #[error("failed to parse policy document '{document}': {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PolicyError {
    pub(crate) fn invalid(document: &str, reason: impl Into<String>) -> Self {
        PolicyError::InvalidDocument {
            document: document.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from caller-supplied context rather than from
    /// the loaded documents.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PolicyError::NoMatchingRule(_) | PolicyError::MissingPlaceholder { .. }
        )
    }
}
