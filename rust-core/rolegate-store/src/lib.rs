// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rolegate Storage Abstraction
//
// Repository contracts for role assignments and audit history, plus
// in-memory backends that honour them.
//
// # Modules
//
// - [`repository`] -- The `RoleRepository` and `HistoryRepository` traits.
// - [`error`] -- The `StoreError` enum.
// - [`memory`] -- `HashMap`/`Vec` backends for tests and single-node use.
// - [`metrics`] -- A transparent wrapper that counts repository calls.

pub mod error;
pub mod memory;
pub mod metrics;
pub mod repository;

pub use error::StoreError;
pub use memory::{InMemoryHistoryRepository, InMemoryRoleRepository};
pub use metrics::{MeteredRoleRepository, RepositoryStats};
pub use repository::{HistoryRepository, RoleRepository, OWNER_ROLE_PROTECTED};
