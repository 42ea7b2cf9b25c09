// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory repositories for Rolegate.
//
// Both repositories keep their data behind a tokio `RwLock`. Every mutating
// call takes the write lock exactly once, which is what makes owner transfer
// and bulk upsert atomic from a reader's point of view. Intended for tests,
// development, and single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use rolegate_model::{
    AuditRecord, BatchMutationResult, HistoryFilter, ResourceRef, Role, RoleAssignment, RoleFilter,
    RoleKey, RoleScope,
};

use crate::error::StoreError;
use crate::repository::{HistoryRepository, RoleRepository, OWNER_ROLE_PROTECTED};

type RoleMap = HashMap<RoleKey, RoleAssignment>;

/// Role repository backed by a `HashMap` keyed by [`RoleKey`].
///
/// Soft-deleted records stay in the map with `deleted_at` set, so a later
/// upsert for the same key revives the original record.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleRepository {
    records: Arc<RwLock<RoleMap>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active records across every scope.
    pub async fn active_len(&self) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.is_active())
            .count()
    }

    /// Fetch a record by key, including soft-deleted ones.
    pub async fn get(&self, key: &RoleKey) -> Option<RoleAssignment> {
        self.records.read().await.get(key).cloned()
    }
}

fn active_in_scope<'a>(
    records: &'a RoleMap,
    scope: &'a RoleScope,
) -> impl Iterator<Item = &'a RoleAssignment> + 'a {
    records
        .values()
        .filter(move |r| r.is_active() && &r.scope == scope)
}

fn holds_active(records: &RoleMap, key: &RoleKey, roles: &[Role]) -> bool {
    records
        .get(key)
        .map(|r| r.is_active() && roles.contains(&r.role))
        .unwrap_or(false)
}

/// True when writing `assignment` would leave its scope with two active owners.
fn second_owner(records: &RoleMap, assignment: &RoleAssignment) -> bool {
    assignment.role == Role::Owner
        && active_in_scope(records, &assignment.scope)
            .any(|r| r.role == Role::Owner && r.user_id != assignment.user_id)
}

/// Keyed upsert under an already-held write lock.
fn upsert_locked(records: &mut RoleMap, assignment: RoleAssignment) -> RoleAssignment {
    match records.get_mut(&assignment.key()) {
        Some(existing) => {
            existing.role = assignment.role;
            existing.user_type = assignment.user_type;
            if assignment.parent_resource_id.is_some() {
                existing.parent_resource_id = assignment.parent_resource_id;
            }
            existing.updated_at = assignment.updated_at;
            existing.updated_by = assignment.updated_by;
            existing.deleted_at = None;
            existing.clone()
        }
        None => {
            records.insert(assignment.key(), assignment.clone());
            assignment
        }
    }
}

impl InMemoryRoleRepository {
    async fn transfer_owner(
        &self,
        scope: RoleScope,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError> {
        if new_owner.scope != scope || new_owner.role != Role::Owner {
            return Err(StoreError::CorruptedData(
                "transfer target must be an owner record in the same scope".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let from_key = RoleKey::new(scope, from_user_id);
        let current = records
            .get_mut(&from_key)
            .filter(|r| r.is_active() && r.role == Role::Owner)
            .ok_or_else(|| StoreError::NotFound(format!("owner {}", from_user_id)))?;

        current.role = Role::Admin;
        current.updated_at = new_owner.updated_at;
        current.updated_by = new_owner.updated_by.clone();

        let to_user = new_owner.user_id.clone();
        upsert_locked(&mut records, new_owner);
        debug!(from = %from_user_id, to = %to_user, "Ownership transferred");
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn has_system_role(
        &self,
        user_id: &str,
        namespace: &str,
        role: Role,
    ) -> Result<bool, StoreError> {
        self.has_any_system_role(user_id, namespace, &[role]).await
    }

    async fn has_any_system_role(
        &self,
        user_id: &str,
        namespace: &str,
        roles: &[Role],
    ) -> Result<bool, StoreError> {
        let records = self.records.read().await;
        let key = RoleKey::new(RoleScope::system(namespace), user_id);
        Ok(holds_active(&records, &key, roles))
    }

    async fn has_resource_role(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        role: Role,
    ) -> Result<bool, StoreError> {
        self.has_any_resource_role(user_id, resource, &[role]).await
    }

    async fn has_any_resource_role(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        roles: &[Role],
    ) -> Result<bool, StoreError> {
        let records = self.records.read().await;
        let key = RoleKey::new(RoleScope::resource(resource.clone()), user_id);
        Ok(holds_active(&records, &key, roles))
    }

    #[instrument(skip(self, assignment), fields(user = %assignment.user_id, role = %assignment.role))]
    async fn create_user_role(
        &self,
        assignment: RoleAssignment,
    ) -> Result<RoleAssignment, StoreError> {
        let mut records = self.records.write().await;
        let key = assignment.key();
        if records.get(&key).map(|r| r.is_active()).unwrap_or(false) {
            return Err(StoreError::DuplicateKey(format!(
                "{} already has a role",
                assignment.user_id
            )));
        }
        if second_owner(&records, &assignment) {
            return Err(StoreError::DuplicateKey("scope already has an owner".to_string()));
        }
        let stored = upsert_locked(&mut records, assignment);
        debug!("Role created");
        Ok(stored)
    }

    #[instrument(skip(self, assignment), fields(user = %assignment.user_id, role = %assignment.role))]
    async fn upsert_user_role(
        &self,
        assignment: RoleAssignment,
    ) -> Result<RoleAssignment, StoreError> {
        let mut records = self.records.write().await;
        if second_owner(&records, &assignment) {
            return Err(StoreError::DuplicateKey("scope already has an owner".to_string()));
        }
        let stored = upsert_locked(&mut records, assignment);
        debug!("Role upserted");
        Ok(stored)
    }

    async fn delete_user_role(&self, key: &RoleKey, deleted_by: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(key)
            .filter(|r| r.is_active())
            .ok_or_else(|| StoreError::NotFound(key.user_id.clone()))?;

        let now = Utc::now();
        record.deleted_at = Some(now);
        record.updated_at = now;
        record.updated_by = deleted_by.to_string();
        debug!(user = %key.user_id, "Role soft-deleted");
        Ok(())
    }

    async fn get_system_owner(&self, namespace: &str) -> Result<Option<RoleAssignment>, StoreError> {
        let records = self.records.read().await;
        let scope = RoleScope::system(namespace);
        let owner = active_in_scope(&records, &scope)
            .find(|r| r.role == Role::Owner)
            .cloned();
        Ok(owner)
    }

    async fn count_system_owners(&self, namespace: &str) -> Result<u64, StoreError> {
        let records = self.records.read().await;
        let scope = RoleScope::system(namespace);
        Ok(active_in_scope(&records, &scope)
            .filter(|r| r.role == Role::Owner)
            .count() as u64)
    }

    async fn transfer_system_owner(
        &self,
        namespace: &str,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError> {
        self.transfer_owner(RoleScope::system(namespace), from_user_id, new_owner)
            .await
    }

    async fn count_resource_owners(&self, resource: &ResourceRef) -> Result<u64, StoreError> {
        let records = self.records.read().await;
        let scope = RoleScope::resource(resource.clone());
        Ok(active_in_scope(&records, &scope)
            .filter(|r| r.role == Role::Owner)
            .count() as u64)
    }

    async fn transfer_resource_owner(
        &self,
        resource: &ResourceRef,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError> {
        self.transfer_owner(RoleScope::resource(resource.clone()), from_user_id, new_owner)
            .await
    }

    async fn count_resource_roles(&self, resource: &ResourceRef) -> Result<u64, StoreError> {
        let records = self.records.read().await;
        let scope = RoleScope::resource(resource.clone());
        Ok(active_in_scope(&records, &scope)
            .filter(|r| r.role != Role::Owner)
            .count() as u64)
    }

    #[instrument(skip(self, assignments), fields(targets = assignments.len()))]
    async fn bulk_upsert_user_roles(
        &self,
        assignments: Vec<RoleAssignment>,
    ) -> Result<BatchMutationResult, StoreError> {
        let mut records = self.records.write().await;
        let mut result = BatchMutationResult::default();

        for assignment in assignments {
            let holds_owner = holds_active(&records, &assignment.key(), &[Role::Owner]);
            if holds_owner || assignment.role == Role::Owner {
                result.record_failure(assignment.user_id, OWNER_ROLE_PROTECTED);
                continue;
            }
            upsert_locked(&mut records, assignment);
            result.record_success();
        }

        debug!(
            succeeded = result.success_count,
            failed = result.failed_count,
            "Bulk upsert applied"
        );
        Ok(result)
    }

    async fn find_user_roles(&self, filter: &RoleFilter) -> Result<Vec<RoleAssignment>, StoreError> {
        let records = self.records.read().await;
        let mut found: Vec<RoleAssignment> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(found)
    }

    async fn soft_delete_resource_user_roles(
        &self,
        resource: &ResourceRef,
        deleted_by: &str,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let mut deleted = 0u64;

        for record in records.values_mut().filter(|r| r.is_active()) {
            let RoleScope::Resource(r) = &record.scope else {
                continue;
            };
            let is_target = r == resource;
            let is_child = r.resource_type.parent() == Some(resource.resource_type)
                && record.parent_resource_id.as_deref() == Some(resource.id.as_str());
            if is_target || is_child {
                record.deleted_at = Some(now);
                record.updated_at = now;
                record.updated_by = deleted_by.to_string();
                deleted += 1;
            }
        }

        debug!(resource = %resource, deleted, "Resource roles soft-deleted");
        Ok(deleted)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// History repository backed by an append-only `Vec`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryRepository {
    records: Arc<RwLock<Vec<AuditRecord>>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of every record in insertion order.
    pub async fn all(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn create_history(&self, record: AuditRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        debug!(operation = %record.operation, caller = %record.caller_id, "History recorded");
        records.push(record);
        Ok(())
    }

    async fn find_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<(Vec<AuditRecord>, u64), StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<&AuditRecord> = records
            .iter()
            .filter(|r| filter.target.matches(&r.scope))
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.page_size as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}
