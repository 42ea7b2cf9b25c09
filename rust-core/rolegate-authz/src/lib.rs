// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rolegate Authorization Core
//
// Answers scoped permission questions against the role repository and owns
// every role mutation, enforcing the owner invariants on top of a store that
// offers no multi-record transactions.
//
// # Modules
//
// - [`service`] -- `PermissionService` and its permission checks, including
//   inheritance-vs-whitelist for nested resources.
// - [`ownership`] -- role mutations and reads on the same service.
// - [`history`] -- the best-effort audit trail.
// - [`error`] -- the `AuthzError` taxonomy.

pub mod error;
pub mod history;
pub mod ownership;
pub mod service;

pub use error::AuthzError;
pub use history::{HistoryPage, HistoryRecorder};
pub use ownership::{BatchGrant, Grant};
pub use service::{AccessTarget, PermissionService};
