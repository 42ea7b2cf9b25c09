// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rolegate Policy
//!
//! Declarative operation policies. Each entity (system, dashboard, dashboard
//! widget, library widget) ships one JSON document mapping action names to
//! ordered rules of the form `{conditions, permission, scope}`. The engine
//! picks the first rule whose conditions hold and expands its permission
//! template; a separate static matrix says which roles carry a permission.
//!
//! # Example
//!
//! ```rust
//! use rolegate_policy::{PolicyContext, PolicyEngine};
//!
//! let engine = PolicyEngine::embedded().unwrap();
//! let ctx = PolicyContext::new()
//!     .with("resource_type", "dashboard")
//!     .with("role", "editor");
//! let (permission, scope) = engine.get_permission("assign_resource_user_role", &ctx).unwrap();
//! assert_eq!(permission, "resource.dashboard.add_member");
//! assert_eq!(scope.as_str(), "resource");
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod rule;
pub mod store;
pub mod template;

pub use context::{keys, PolicyContext};
pub use engine::PolicyEngine;
pub use error::PolicyError;
pub use matrix::PermissionMatrix;
pub use rule::{PolicyDocument, PolicyRule};
pub use store::PolicyStore;
pub use template::{PermissionTemplate, Placeholder};
