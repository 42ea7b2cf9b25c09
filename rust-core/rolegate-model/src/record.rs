// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Role assignment records and the values derived from them.
//
// A role assignment is identified by a scope-discriminated key:
// `(namespace, user_id)` at system scope, `(resource_id, resource_type,
// user_id)` at resource scope. At most one active record exists per key; a
// soft-deleted record is revived in place rather than duplicated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vocab::{ResourceType, Role, UserType};

/// A concrete resource: its id and its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "resource_id")]
    pub id: String,
    pub resource_type: ResourceType,
}

impl ResourceRef {
    pub fn new(id: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            id: id.into(),
            resource_type,
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// The scope a role is recorded at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RoleScope {
    /// A namespace. The empty namespace is the global scope moderators live in.
    System { namespace: String },
    Resource(ResourceRef),
}

impl RoleScope {
    pub fn system(namespace: impl Into<String>) -> Self {
        RoleScope::System {
            namespace: namespace.into(),
        }
    }

    pub fn global() -> Self {
        RoleScope::system("")
    }

    pub fn resource(resource: ResourceRef) -> Self {
        RoleScope::Resource(resource)
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            RoleScope::System { namespace } => Some(namespace),
            RoleScope::Resource(_) => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceRef> {
        match self {
            RoleScope::Resource(r) => Some(r),
            RoleScope::System { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RoleScope::System { .. } => "system",
            RoleScope::Resource(_) => "resource",
        }
    }
}

/// Identity key of a role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleKey {
    #[serde(flatten)]
    pub scope: RoleScope,
    pub user_id: String,
}

impl RoleKey {
    pub fn new(scope: RoleScope, user_id: impl Into<String>) -> Self {
        Self {
            scope,
            user_id: user_id.into(),
        }
    }
}

/// A user's role at one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    #[serde(flatten)]
    pub scope: RoleScope,
    pub user_id: String,
    pub role: Role,
    pub user_type: UserType,
    /// Set for nested resources so a record can be traced to its parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_resource_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Caller that last wrote the record.
    pub updated_by: String,
    /// Soft-delete marker; `None` while the record is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    /// Build a fresh, active assignment stamped with the current time.
    pub fn new(
        scope: RoleScope,
        user_id: impl Into<String>,
        role: Role,
        user_type: UserType,
        updated_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            scope,
            user_id: user_id.into(),
            role,
            user_type,
            parent_resource_id: None,
            created_at: now,
            updated_at: now,
            updated_by: updated_by.into(),
            deleted_at: None,
        }
    }

    pub fn with_parent(mut self, parent_resource_id: Option<String>) -> Self {
        self.parent_resource_id = parent_resource_id;
        self
    }

    pub fn key(&self) -> RoleKey {
        RoleKey::new(self.scope.clone(), self.user_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// One rejected target in a batch mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub user_id: String,
    pub reason: String,
}

/// Per-target outcome of a multi-target role assignment.
///
/// An all-failed result is still a successful call; only a storage failure
/// makes the whole batch an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMutationResult {
    pub success_count: u64,
    pub failed_count: u64,
    pub failed_entries: Vec<FailedEntry>,
}

impl BatchMutationResult {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, user_id: impl Into<String>, reason: impl Into<String>) {
        self.failed_count += 1;
        self.failed_entries.push(FailedEntry {
            user_id: user_id.into(),
            reason: reason.into(),
        });
    }

    pub fn total(&self) -> u64 {
        self.success_count + self.failed_count
    }
}

/// Filter for listing active role assignments.
///
/// `namespace` and `resource` are mutually exclusive; leaving both unset
/// lists across every scope (used for "my roles").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFilter {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub resource: Option<ResourceRef>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Empty means any role.
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl RoleFilter {
    pub fn for_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn for_resource(resource: ResourceRef) -> Self {
        Self {
            resource: Some(resource),
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether an assignment satisfies the filter. Soft-deleted records never do.
    pub fn matches(&self, assignment: &RoleAssignment) -> bool {
        if !assignment.is_active() {
            return false;
        }
        if let Some(ns) = &self.namespace {
            if assignment.scope.namespace() != Some(ns.as_str()) {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if assignment.scope.as_resource() != Some(resource) {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if &assignment.user_id != user_id {
                return false;
            }
        }
        self.roles.is_empty() || self.roles.contains(&assignment.role)
    }
}
