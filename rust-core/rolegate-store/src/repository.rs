// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Repository contracts consumed by the Rolegate authorization core.
//
// The concrete document-store driver lives outside this workspace. These
// traits pin down what the core relies on: a uniqueness signal for owners
// and keys, single-call atomic owner transfer and bulk upsert, keyed upsert
// that revives soft-deleted records, and idempotence left to the caller
// (delete reports `NotFound` for an absent record).

use async_trait::async_trait;

use rolegate_model::{
    AuditRecord, BatchMutationResult, HistoryFilter, ResourceRef, Role, RoleAssignment, RoleFilter,
    RoleKey,
};

use crate::error::StoreError;

/// Failure reason reported by bulk upsert for a target that currently holds
/// the owner role.
pub const OWNER_ROLE_PROTECTED: &str = "owner role protected";

/// Storage of role assignments.
///
/// Implementations must be safe to share across threads and tokio tasks.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Whether `user_id` holds exactly `role` in `namespace`.
    async fn has_system_role(
        &self,
        user_id: &str,
        namespace: &str,
        role: Role,
    ) -> Result<bool, StoreError>;

    /// Whether `user_id` holds any of `roles` in `namespace`.
    /// An empty `roles` slice is always `false`.
    async fn has_any_system_role(
        &self,
        user_id: &str,
        namespace: &str,
        roles: &[Role],
    ) -> Result<bool, StoreError>;

    async fn has_resource_role(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        role: Role,
    ) -> Result<bool, StoreError>;

    async fn has_any_resource_role(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        roles: &[Role],
    ) -> Result<bool, StoreError>;

    /// Insert a new active assignment.
    ///
    /// Fails with [`StoreError::DuplicateKey`] when an active record already
    /// exists for the key, or when `role` is owner and the scope already has
    /// an active owner. A soft-deleted record for the key is revived.
    async fn create_user_role(&self, assignment: RoleAssignment)
        -> Result<RoleAssignment, StoreError>;

    /// Keyed upsert. Revives a soft-deleted record in place, keeps its
    /// `created_at` and always refreshes `updated_by`/`updated_at`.
    async fn upsert_user_role(&self, assignment: RoleAssignment)
        -> Result<RoleAssignment, StoreError>;

    /// Soft-delete the active record for `key`.
    ///
    /// Returns [`StoreError::NotFound`] when no active record exists.
    async fn delete_user_role(&self, key: &RoleKey, deleted_by: &str) -> Result<(), StoreError>;

    async fn get_system_owner(&self, namespace: &str) -> Result<Option<RoleAssignment>, StoreError>;

    async fn count_system_owners(&self, namespace: &str) -> Result<u64, StoreError>;

    /// Atomically demote `from_user_id` (the current owner) to admin and make
    /// `new_owner` the owner. No reader observes zero or two owners.
    async fn transfer_system_owner(
        &self,
        namespace: &str,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError>;

    async fn count_resource_owners(&self, resource: &ResourceRef) -> Result<u64, StoreError>;

    /// Resource-scope counterpart of [`RoleRepository::transfer_system_owner`].
    async fn transfer_resource_owner(
        &self,
        resource: &ResourceRef,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError>;

    /// Number of active explicit non-owner role records on the resource.
    ///
    /// The owner record marks who created the resource and is not part of
    /// its whitelist.
    async fn count_resource_roles(&self, resource: &ResourceRef) -> Result<u64, StoreError>;

    /// Upsert many assignments in one call, reporting per-target outcomes.
    /// A target whose current active role is owner is never overwritten.
    async fn bulk_upsert_user_roles(
        &self,
        assignments: Vec<RoleAssignment>,
    ) -> Result<BatchMutationResult, StoreError>;

    /// Active assignments matching `filter`.
    async fn find_user_roles(&self, filter: &RoleFilter) -> Result<Vec<RoleAssignment>, StoreError>;

    /// Soft-delete every active record on the resource and on resources
    /// nested under it. Returns how many records were deleted.
    async fn soft_delete_resource_user_roles(
        &self,
        resource: &ResourceRef,
        deleted_by: &str,
    ) -> Result<u64, StoreError>;

    /// A human-readable name for this repository, used in logging.
    fn name(&self) -> &str;
}

/// Append-only storage of audit records.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn create_history(&self, record: AuditRecord) -> Result<(), StoreError>;

    /// One page of matching records, newest first, plus the total match count.
    async fn find_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<(Vec<AuditRecord>, u64), StoreError>;
}
