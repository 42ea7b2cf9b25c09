// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Repository error types for Rolegate.
//
// Covers the signals a document store gives back to the authorization core:
// a uniqueness violation, an absent record, and everything else that means
// the store itself failed.

use thiserror::Error;

/// Errors that can occur when interacting with a role or history repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (duplicate key or second
    /// active owner). Callers map this to a conflict, never to an internal error.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The record addressed by the call does not exist (or is soft-deleted).
    #[error("record not found: {0}")]
    NotFound(String),

    /// The stored data is corrupted or in an unexpected format.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// The storage backend is not available (e.g., connection lost).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
