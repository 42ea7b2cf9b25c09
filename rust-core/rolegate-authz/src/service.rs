// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Permission & Ownership Service: permission checks.
//!
//! A permission question "may `user` do `P` here?" becomes "does `user` hold
//! any role in `roles_with_permission(P)` here?". For nested resources the
//! "here" is decided by inheritance-vs-whitelist:
//!
//! - the child has no explicit non-owner role records: the caller's role on
//!   the parent decides (inherited);
//! - the child has at least one such record: only roles recorded on the
//!   child itself count (whitelist).
//!
//! The owner record written when a child is created does not open a
//! whitelist, so new children start out inherited.
//!
//! The role count and the role lookup are two separate reads. A writer that
//! adds the first explicit role between them can yield one stale "inherited"
//! decision; that window is accepted.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use rolegate_model::{CheckScope, ResourceRef, ResourceType, Role};
use rolegate_policy::PolicyEngine;
use rolegate_store::RoleRepository;

use crate::error::AuthzError;
use crate::history::HistoryRecorder;

/// What a permission is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessTarget {
    pub namespace: Option<String>,
    pub resource: Option<ResourceRef>,
    /// Parent of `resource`, for nested types.
    pub parent: Option<ResourceRef>,
}

impl AccessTarget {
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn resource(resource: ResourceRef) -> Self {
        Self {
            resource: Some(resource),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: Option<ResourceRef>) -> Self {
        self.parent = parent;
        self
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.id.as_str())
    }
}

#[derive(Clone)]
pub struct PermissionService {
    pub(crate) roles: Arc<dyn RoleRepository>,
    pub(crate) engine: Arc<PolicyEngine>,
    pub(crate) history: HistoryRecorder,
}

impl PermissionService {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        engine: Arc<PolicyEngine>,
        history: HistoryRecorder,
    ) -> Self {
        Self {
            roles,
            engine,
            history,
        }
    }

    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    fn required_roles(&self, permission: &str) -> Vec<Role> {
        self.engine
            .roles_with_permission(permission)
            .into_iter()
            .collect()
    }

    /// Permission at system scope with the empty namespace.
    pub async fn check_global_permission(
        &self,
        user_id: &str,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        self.check_system_permission(user_id, "", permission).await
    }

    pub async fn check_system_permission(
        &self,
        user_id: &str,
        namespace: &str,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        let roles = self.required_roles(permission);
        if roles.is_empty() {
            return Ok(false);
        }
        Ok(self.roles.has_any_system_role(user_id, namespace, &roles).await?)
    }

    /// Permission held directly on `resource`, ignoring any parent.
    pub async fn check_explicit_resource_permission(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        let roles = self.required_roles(permission);
        if roles.is_empty() {
            return Ok(false);
        }
        Ok(self.roles.has_any_resource_role(user_id, resource, &roles).await?)
    }

    /// Permission on `resource`, applying inheritance-vs-whitelist when the
    /// resource type is nested and its parent id is known.
    pub async fn check_resource_permission(
        &self,
        user_id: &str,
        resource: &ResourceRef,
        parent_id: Option<&str>,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        let parent = match (resource.resource_type.parent(), parent_id) {
            (Some(parent_type), Some(id)) if !id.is_empty() => ResourceRef::new(id, parent_type),
            _ => {
                return self
                    .check_explicit_resource_permission(user_id, resource, permission)
                    .await
            }
        };

        let explicit = self.roles.count_resource_roles(resource).await?;
        if explicit == 0 {
            debug!(resource = %resource, parent = %parent, "No explicit roles, inheriting from parent");
            self.check_explicit_resource_permission(user_id, &parent, permission)
                .await
        } else {
            self.check_explicit_resource_permission(user_id, resource, permission)
                .await
        }
    }

    /// Permission on the parent, never on the child being acted on.
    pub async fn check_parent_resource_permission(
        &self,
        user_id: &str,
        parent: &ResourceRef,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        self.check_explicit_resource_permission(user_id, parent, permission)
            .await
    }

    /// Subset of `child_ids` (children of `parent`) the caller may access.
    ///
    /// Each child is resolved independently and concurrently; one child's
    /// outcome never short-circuits the others. Input order is preserved.
    #[instrument(skip(self, child_ids), fields(children = child_ids.len()))]
    pub async fn filter_accessible_resources(
        &self,
        user_id: &str,
        parent: &ResourceRef,
        child_type: ResourceType,
        child_ids: Vec<String>,
        permission: &str,
    ) -> Result<Vec<String>, AuthzError> {
        if child_type.parent() != Some(parent.resource_type) {
            return Err(AuthzError::validation(format!(
                "{} is not nested under {}",
                child_type, parent.resource_type
            )));
        }

        let checks = child_ids.iter().map(|id| {
            let child = ResourceRef::new(id.clone(), child_type);
            async move {
                self.check_resource_permission(user_id, &child, Some(parent.id.as_str()), permission)
                    .await
            }
        });
        let outcomes = join_all(checks).await;

        let mut accessible = Vec::new();
        for (id, outcome) in child_ids.into_iter().zip(outcomes) {
            if outcome? {
                accessible.push(id);
            }
        }
        Ok(accessible)
    }

    /// Dispatch a permission check on its scope. `Ok(())` when granted.
    ///
    /// Denials are `Forbidden` even when the target does not exist.
    pub async fn authorize(
        &self,
        caller: &str,
        scope: CheckScope,
        target: &AccessTarget,
        permission: &str,
    ) -> Result<(), AuthzError> {
        let allowed = match scope {
            CheckScope::None => return Ok(()),
            CheckScope::Global => self.check_global_permission(caller, permission).await?,
            CheckScope::System => {
                let namespace = target
                    .namespace
                    .as_deref()
                    .ok_or_else(|| AuthzError::validation("namespace is required"))?;
                self.check_system_permission(caller, namespace, permission)
                    .await?
            }
            CheckScope::Resource => {
                let resource = target
                    .resource
                    .as_ref()
                    .ok_or_else(|| AuthzError::validation("resource_id is required"))?;
                self.check_resource_permission(caller, resource, target.parent_id(), permission)
                    .await?
            }
            CheckScope::ParentResource => {
                let parent = target
                    .parent
                    .as_ref()
                    .ok_or_else(|| AuthzError::validation("parent_resource_id is required"))?;
                self.check_parent_resource_permission(caller, parent, permission)
                    .await?
            }
        };

        if allowed {
            debug!(caller = %caller, permission = %permission, scope = %scope, "Access granted");
            Ok(())
        } else {
            warn!(caller = %caller, permission = %permission, scope = %scope, "Access denied");
            Err(AuthzError::forbidden(format!(
                "permission '{}' denied",
                permission
            )))
        }
    }

    /// Side-effect-free predicate for downstream services. Picks the
    /// narrowest scope the target names.
    pub async fn check_permission(
        &self,
        caller: &str,
        permission: &str,
        target: &AccessTarget,
    ) -> Result<bool, AuthzError> {
        let scope = if target.resource.is_some() {
            CheckScope::Resource
        } else if target.namespace.is_some() {
            CheckScope::System
        } else {
            CheckScope::Global
        };
        match self.authorize(caller, scope, target, permission).await {
            Ok(()) => Ok(true),
            Err(AuthzError::Forbidden(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_model::{RoleAssignment, RoleScope, UserType};
    use rolegate_store::{InMemoryHistoryRepository, InMemoryRoleRepository, MeteredRoleRepository};

    fn service_over(roles: Arc<dyn RoleRepository>) -> PermissionService {
        PermissionService::new(
            roles,
            Arc::new(PolicyEngine::embedded().unwrap()),
            HistoryRecorder::new(Arc::new(InMemoryHistoryRepository::new())),
        )
    }

    async fn grant_on(repo: &InMemoryRoleRepository, resource: &ResourceRef, user: &str, role: Role) {
        let parent = resource.resource_type.parent().map(|_| "d1".to_string());
        repo.upsert_user_role(
            RoleAssignment::new(RoleScope::resource(resource.clone()), user, role, UserType::Individual, "root")
                .with_parent(parent),
        )
        .await
        .unwrap();
    }

    fn dashboard() -> ResourceRef {
        ResourceRef::new("d1", ResourceType::Dashboard)
    }

    fn widget(id: &str) -> ResourceRef {
        ResourceRef::new(id, ResourceType::DashboardWidget)
    }

    #[tokio::test]
    async fn test_widget_without_roles_inherits_from_parent() {
        let repo = InMemoryRoleRepository::new();
        grant_on(&repo, &dashboard(), "alice", Role::Viewer).await;
        let service = service_over(Arc::new(repo));

        let allowed = service
            .check_resource_permission("alice", &widget("w1"), Some("d1"), "resource.dashboard_widget.read")
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_widget_with_roles_is_a_whitelist() {
        let repo = InMemoryRoleRepository::new();
        grant_on(&repo, &dashboard(), "alice", Role::Owner).await;
        grant_on(&repo, &widget("w1"), "bob", Role::Viewer).await;
        let service = service_over(Arc::new(repo));

        // Parent owner no longer reaches the whitelisted widget.
        let alice = service
            .check_resource_permission("alice", &widget("w1"), Some("d1"), "resource.dashboard_widget.read")
            .await
            .unwrap();
        let bob = service
            .check_resource_permission("bob", &widget("w1"), Some("d1"), "resource.dashboard_widget.read")
            .await
            .unwrap();
        assert!(!alice);
        assert!(bob);
    }

    #[tokio::test]
    async fn test_filter_accessible_resolves_each_child() {
        let repo = InMemoryRoleRepository::new();
        grant_on(&repo, &dashboard(), "alice", Role::Viewer).await;
        grant_on(&repo, &widget("w2"), "bob", Role::Viewer).await;
        grant_on(&repo, &widget("w3"), "alice", Role::Viewer).await;
        let service = service_over(Arc::new(repo));

        let ids = vec!["w1".to_string(), "w2".to_string(), "w3".to_string()];
        let accessible = service
            .filter_accessible_resources(
                "alice",
                &dashboard(),
                ResourceType::DashboardWidget,
                ids,
                "resource.dashboard_widget.read",
            )
            .await
            .unwrap();
        assert_eq!(accessible, vec!["w1".to_string(), "w3".to_string()]);
    }

    #[tokio::test]
    async fn test_filter_accessible_rejects_unrelated_types() {
        let service = service_over(Arc::new(InMemoryRoleRepository::new()));
        let err = service
            .filter_accessible_resources(
                "alice",
                &ResourceRef::new("l1", ResourceType::LibraryWidget),
                ResourceType::DashboardWidget,
                vec!["w1".to_string()],
                "resource.dashboard_widget.read",
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_parent_scope_ignores_child_roles() {
        let repo = InMemoryRoleRepository::new();
        grant_on(&repo, &widget("w1"), "bob", Role::Owner).await;
        let service = service_over(Arc::new(repo));

        let target = AccessTarget::resource(widget("w1")).with_parent(Some(dashboard()));
        let err = service
            .authorize("bob", CheckScope::ParentResource, &target, "resource.dashboard.add_widget_viewer")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_global_scope_uses_empty_namespace() {
        let repo = InMemoryRoleRepository::new();
        repo.upsert_user_role(RoleAssignment::new(
            RoleScope::global(),
            "mod",
            Role::Moderator,
            UserType::Individual,
            "bootstrap",
        ))
        .await
        .unwrap();
        let service = service_over(Arc::new(repo));

        service
            .authorize("mod", CheckScope::Global, &AccessTarget::default(), "system.create_owner")
            .await
            .unwrap();
        assert!(service
            .authorize("alice", CheckScope::Global, &AccessTarget::default(), "system.create_owner")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_permission_denies_without_repository_call() {
        let repo = Arc::new(MeteredRoleRepository::new(InMemoryRoleRepository::new()));
        let service = service_over(repo.clone());

        let allowed = service
            .check_permission("alice", "system.launch", &AccessTarget::namespace("ns"))
            .await
            .unwrap();
        assert!(!allowed);
        assert_eq!(repo.stats().await.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_none_scope_skips_repository() {
        let repo = Arc::new(MeteredRoleRepository::new(InMemoryRoleRepository::new()));
        let service = service_over(repo.clone());

        service
            .authorize("anyone", CheckScope::None, &AccessTarget::default(), "whatever")
            .await
            .unwrap();
        assert_eq!(repo.stats().await.total_calls(), 0);
    }
}
