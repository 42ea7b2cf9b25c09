// SPDX-License-Identifier: PMPL-1.0-or-later
//! Audit (history) records and the filter used to page through them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{ResourceRef, RoleScope};

/// Whether the audited mutation was applied or turned away by a business rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Applied,
    Rejected,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOutcome::Applied => write!(f, "applied"),
            AuditOutcome::Rejected => write!(f, "rejected"),
        }
    }
}

/// Append-only record of one mutation attempt. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Operation name as routed (e.g. `assign_system_user_role`).
    pub operation: String,
    pub caller_id: String,
    /// Scope plus namespace or resource identity.
    #[serde(flatten)]
    pub scope: RoleScope,
    pub timestamp: DateTime<Utc>,
    pub outcome: AuditOutcome,
    /// Operation-specific payload (target user, role, batch result, rejection reason).
    pub detail: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        operation: impl Into<String>,
        caller_id: impl Into<String>,
        scope: RoleScope,
        outcome: AuditOutcome,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: operation.into(),
            caller_id: caller_id.into(),
            scope,
            timestamp: Utc::now(),
            outcome,
            detail,
        }
    }
}

/// Which history to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum HistoryTarget {
    System {
        namespace: String,
    },
    /// A resource's history, optionally together with its children's.
    Resource {
        #[serde(flatten)]
        resource: ResourceRef,
        #[serde(default)]
        descendant_ids: Vec<String>,
    },
}

impl HistoryTarget {
    /// Whether a record belongs to this target.
    pub fn matches(&self, scope: &RoleScope) -> bool {
        match (self, scope) {
            (HistoryTarget::System { namespace }, RoleScope::System { namespace: ns }) => {
                namespace == ns
            }
            (
                HistoryTarget::Resource {
                    resource,
                    descendant_ids,
                },
                RoleScope::Resource(r),
            ) => {
                if r == resource {
                    return true;
                }
                r.resource_type.parent() == Some(resource.resource_type)
                    && descendant_ids.iter().any(|id| id == &r.id)
            }
            _ => false,
        }
    }
}

/// Paginated history query. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub target: HistoryTarget,
    pub page: u32,
    pub page_size: u32,
}

impl HistoryFilter {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    pub fn new(target: HistoryTarget) -> Self {
        Self {
            target,
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Number of records to skip for the requested page.
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }
}
