// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics-collecting wrapper for role repositories.
//
// Wraps any `RoleRepository` and counts calls by kind. Tests use the counts
// to assert that a request rejected by validation never touched storage.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use rolegate_model::{BatchMutationResult, ResourceRef, Role, RoleAssignment, RoleFilter, RoleKey};

use crate::error::StoreError;
use crate::repository::RoleRepository;

/// Accumulated statistics for a role repository.
#[derive(Debug, Clone, Default)]
pub struct RepositoryStats {
    /// Membership checks (`has_*`).
    pub check_count: u64,
    /// Owner and role counts.
    pub count_count: u64,
    /// Reads returning records (`get_system_owner`, `find_user_roles`).
    pub read_count: u64,
    /// Mutations of any kind, including transfers and bulk upserts.
    pub write_count: u64,
    /// Cumulative wall-clock latency of all writes, in milliseconds.
    pub write_latency_sum_ms: f64,
}

impl RepositoryStats {
    pub fn total_calls(&self) -> u64 {
        self.check_count + self.count_count + self.read_count + self.write_count
    }
}

/// A role repository wrapper that collects call counts.
///
/// Statistics are available via [`MeteredRoleRepository::stats`].
pub struct MeteredRoleRepository<R: RoleRepository> {
    inner: R,
    stats: Arc<RwLock<RepositoryStats>>,
}

impl<R: RoleRepository> MeteredRoleRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(RepositoryStats::default())),
        }
    }

    /// Return a snapshot of the current statistics.
    pub async fn stats(&self) -> RepositoryStats {
        self.stats.read().await.clone()
    }

    pub async fn reset_stats(&self) {
        let mut s = self.stats.write().await;
        *s = RepositoryStats::default();
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn checked(&self) {
        self.stats.write().await.check_count += 1;
    }

    async fn counted(&self) {
        self.stats.write().await.count_count += 1;
    }

    async fn read(&self) {
        self.stats.write().await.read_count += 1;
    }

    async fn wrote(&self, start: Instant) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let mut s = self.stats.write().await;
        s.write_count += 1;
        s.write_latency_sum_ms += elapsed_ms;
    }
}

#[async_trait]
impl<R: RoleRepository> RoleRepository for MeteredRoleRepository<R> {
    async fn has_system_role(
        &self,
        user_id: &str,
        namespace: &str,
        role: Role,
    ) -> Result<bool, StoreError> {
        self.checked().await;
        self.inner.has_system_role(user_id, namespace, role).await
    }

    async fn has_any_system_role(
        &self,
        user_id: &str,
        namespace: &str,
        roles: &[Role],
    ) -> Result<bool, StoreError> {
        self.checked().await;
        self.inner.has_any_system_role(user_id, namespace, roles).await
    }

    async fn has_resource_role(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        role: Role,
    ) -> Result<bool, StoreError> {
        self.checked().await;
        self.inner.has_resource_role(user_id, resource, role).await
    }

    async fn has_any_resource_role(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        roles: &[Role],
    ) -> Result<bool, StoreError> {
        self.checked().await;
        self.inner.has_any_resource_role(user_id, resource, roles).await
    }

    async fn create_user_role(
        &self,
        assignment: RoleAssignment,
    ) -> Result<RoleAssignment, StoreError> {
        let start = Instant::now();
        let result = self.inner.create_user_role(assignment).await;
        self.wrote(start).await;
        result
    }

    async fn upsert_user_role(
        &self,
        assignment: RoleAssignment,
    ) -> Result<RoleAssignment, StoreError> {
        let start = Instant::now();
        let result = self.inner.upsert_user_role(assignment).await;
        self.wrote(start).await;
        result
    }

    async fn delete_user_role(&self, key: &RoleKey, deleted_by: &str) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.inner.delete_user_role(key, deleted_by).await;
        self.wrote(start).await;
        result
    }

    async fn get_system_owner(&self, namespace: &str) -> Result<Option<RoleAssignment>, StoreError> {
        self.read().await;
        self.inner.get_system_owner(namespace).await
    }

    async fn count_system_owners(&self, namespace: &str) -> Result<u64, StoreError> {
        self.counted().await;
        self.inner.count_system_owners(namespace).await
    }

    async fn transfer_system_owner(
        &self,
        namespace: &str,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self
            .inner
            .transfer_system_owner(namespace, from_user_id, new_owner)
            .await;
        self.wrote(start).await;
        result
    }

    async fn count_resource_owners(&self, resource: &ResourceRef) -> Result<u64, StoreError> {
        self.counted().await;
        self.inner.count_resource_owners(resource).await
    }

    async fn transfer_resource_owner(
        &self,
        resource: &ResourceRef,
        from_user_id: &str,
        new_owner: RoleAssignment,
    ) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self
            .inner
            .transfer_resource_owner(resource, from_user_id, new_owner)
            .await;
        self.wrote(start).await;
        result
    }

    async fn count_resource_roles(&self, resource: &ResourceRef) -> Result<u64, StoreError> {
        self.counted().await;
        self.inner.count_resource_roles(resource).await
    }

    async fn bulk_upsert_user_roles(
        &self,
        assignments: Vec<RoleAssignment>,
    ) -> Result<BatchMutationResult, StoreError> {
        let start = Instant::now();
        let result = self.inner.bulk_upsert_user_roles(assignments).await;
        self.wrote(start).await;
        result
    }

    async fn find_user_roles(&self, filter: &RoleFilter) -> Result<Vec<RoleAssignment>, StoreError> {
        self.read().await;
        self.inner.find_user_roles(filter).await
    }

    async fn soft_delete_resource_user_roles(
        &self,
        resource: &ResourceRef,
        deleted_by: &str,
    ) -> Result<u64, StoreError> {
        let start = Instant::now();
        let result = self
            .inner
            .soft_delete_resource_user_roles(resource, deleted_by)
            .await;
        self.wrote(start).await;
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
