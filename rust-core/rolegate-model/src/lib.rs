// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rolegate Model
//!
//! Shared vocabulary and records for the Rolegate authorization backend.
//!
//! # Modules
//!
//! - [`vocab`]: the closed set of roles, resource types, user types and
//!   check scopes.
//! - [`record`]: role assignments, their scope-discriminated keys, batch
//!   results and list filters.
//! - [`audit`]: append-only audit records and history queries.

pub mod audit;
pub mod record;
pub mod vocab;

pub use audit::{AuditOutcome, AuditRecord, HistoryFilter, HistoryTarget};
pub use record::{
    BatchMutationResult, FailedEntry, ResourceRef, RoleAssignment, RoleFilter, RoleKey, RoleScope,
};
pub use vocab::{CheckScope, ResourceType, Role, UserType, VocabularyError};
