// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Permission & Ownership Service: role mutations and reads.
//!
//! Every mutation validates its input first. Validation failures return
//! before the repository is touched and leave no audit record. Past that
//! point each attempt, applied or rejected, writes exactly one audit record.
//!
//! Owner invariants:
//! - only the owner-creation and transfer operations set `owner`;
//! - the sole owner can be neither deleted nor downgraded;
//! - transfer is one repository call that demotes the old owner to admin.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use rolegate_model::{
    AuditOutcome, AuditRecord, BatchMutationResult, HistoryFilter, ResourceRef, Role,
    RoleAssignment, RoleFilter, RoleKey, RoleScope, UserType,
};
use rolegate_store::StoreError;

use crate::error::AuthzError;
use crate::history::HistoryPage;
use crate::service::PermissionService;

/// A role to grant one user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Grant {
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub user_type: UserType,
}

/// The same role for several users.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchGrant {
    pub user_ids: Vec<String>,
    pub role: Role,
    #[serde(default)]
    pub user_type: UserType,
}

fn require(value: &str, name: &str) -> Result<(), AuthzError> {
    if value.trim().is_empty() {
        return Err(AuthzError::validation(format!("{} is required", name)));
    }
    Ok(())
}

/// Roles the generic assignment paths may write.
fn require_assignable(role: Role) -> Result<(), AuthzError> {
    match role {
        Role::Owner => Err(AuthzError::validation(
            "owner can only be set by owner creation or transfer",
        )),
        Role::Moderator => Err(AuthzError::validation(
            "moderator cannot be assigned in a namespace or on a resource",
        )),
        Role::Admin | Role::Editor | Role::Viewer => Ok(()),
    }
}

fn require_batch(batch: &BatchGrant) -> Result<(), AuthzError> {
    require_assignable(batch.role)?;
    if batch.user_ids.is_empty() {
        return Err(AuthzError::validation("user_ids must not be empty"));
    }
    for user_id in &batch.user_ids {
        require(user_id, "user_id")?;
    }
    Ok(())
}

/// Parent reference for a nested resource. Required exactly when the type
/// has a parent.
fn nested_parent(
    resource: &ResourceRef,
    parent_id: Option<&str>,
) -> Result<Option<ResourceRef>, AuthzError> {
    match resource.resource_type.parent() {
        Some(parent_type) => {
            let id = parent_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                AuthzError::validation(format!(
                    "parent_resource_id is required for {}",
                    resource.resource_type
                ))
            })?;
            Ok(Some(ResourceRef::new(id, parent_type)))
        }
        None => Ok(None),
    }
}

/// A transfer whose source owner vanished between read and write.
fn transfer_error(err: StoreError) -> AuthzError {
    if err.is_not_found() {
        AuthzError::Conflict("ownership changed concurrently".to_string())
    } else {
        err.into()
    }
}

fn batch_detail(batch: &BatchGrant, result: &Result<BatchMutationResult, AuthzError>) -> Value {
    let mut detail = json!({
        "role": batch.role,
        "user_ids": batch.user_ids,
    });
    if let (Ok(r), Value::Object(map)) = (result, &mut detail) {
        map.insert("success_count".to_string(), json!(r.success_count));
        map.insert("failed_count".to_string(), json!(r.failed_count));
        map.insert("failed_entries".to_string(), json!(r.failed_entries));
    }
    detail
}

impl PermissionService {
    /// Record the attempt and hand the result back unchanged.
    async fn audited<T>(
        &self,
        operation: &str,
        caller: &str,
        scope: RoleScope,
        mut detail: Value,
        result: Result<T, AuthzError>,
    ) -> Result<T, AuthzError> {
        let outcome = match &result {
            Ok(_) => {
                info!(operation, caller, scope = scope.kind(), "Mutation applied");
                AuditOutcome::Applied
            }
            Err(e) => {
                warn!(operation, caller, scope = scope.kind(), error = %e, "Mutation rejected");
                if let Value::Object(map) = &mut detail {
                    map.insert("reason".to_string(), json!(e.to_string()));
                }
                AuditOutcome::Rejected
            }
        };
        self.history
            .record(AuditRecord::new(operation, caller, scope, outcome, detail))
            .await;
        result
    }

    async fn guard_sole_system_owner(&self, namespace: &str, user_id: &str) -> Result<(), AuthzError> {
        if self.roles.has_system_role(user_id, namespace, Role::Owner).await?
            && self.roles.count_system_owners(namespace).await? == 1
        {
            return Err(AuthzError::forbidden(
                "cannot remove or downgrade the sole owner",
            ));
        }
        Ok(())
    }

    async fn guard_sole_resource_owner(
        &self,
        resource: &ResourceRef,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        if self.roles.has_resource_role(user_id, resource, Role::Owner).await?
            && self.roles.count_resource_owners(resource).await? == 1
        {
            return Err(AuthzError::forbidden(
                "cannot remove or downgrade the sole owner",
            ));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // System scope
    // ---------------------------------------------------------------------

    /// Make `user_id` the first owner of `namespace`. A second owner, or an
    /// active record already held by `user_id`, is a conflict reported by the
    /// repository.
    #[instrument(skip(self))]
    pub async fn create_system_owner(
        &self,
        caller: &str,
        namespace: &str,
        user_id: &str,
        user_type: UserType,
    ) -> Result<RoleAssignment, AuthzError> {
        require(namespace, "namespace")?;
        require(user_id, "user_id")?;

        let scope = RoleScope::system(namespace);
        let owner = RoleAssignment::new(scope.clone(), user_id, Role::Owner, user_type, caller);
        let result = self.roles.create_user_role(owner).await.map_err(AuthzError::from);

        let detail = json!({ "user_id": user_id, "role": Role::Owner });
        self.audited("create_system_owner", caller, scope, detail, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn transfer_system_owner(
        &self,
        caller: &str,
        namespace: &str,
        new_owner_id: &str,
        user_type: UserType,
    ) -> Result<RoleAssignment, AuthzError> {
        require(namespace, "namespace")?;
        require(new_owner_id, "user_id")?;

        let current = self.roles.get_system_owner(namespace).await?;
        if current.as_ref().map(|c| c.user_id.as_str()) == Some(new_owner_id) {
            return Err(AuthzError::validation("user is already the owner"));
        }

        let scope = RoleScope::system(namespace);
        let detail = json!({
            "from": current.as_ref().map(|c| c.user_id.clone()),
            "to": new_owner_id,
        });
        let result = match current {
            None => Err(AuthzError::forbidden("namespace has no owner to transfer from")),
            Some(current) => {
                let new_owner =
                    RoleAssignment::new(scope.clone(), new_owner_id, Role::Owner, user_type, caller);
                self.roles
                    .transfer_system_owner(namespace, &current.user_id, new_owner.clone())
                    .await
                    .map(|()| new_owner)
                    .map_err(transfer_error)
            }
        };
        self.audited("transfer_system_owner", caller, scope, detail, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn assign_system_user_role(
        &self,
        caller: &str,
        namespace: &str,
        grant: Grant,
    ) -> Result<RoleAssignment, AuthzError> {
        require(namespace, "namespace")?;
        require(&grant.user_id, "user_id")?;
        require_assignable(grant.role)?;

        let scope = RoleScope::system(namespace);
        let result: Result<RoleAssignment, AuthzError> = async {
            self.guard_sole_system_owner(namespace, &grant.user_id).await?;
            let assignment =
                RoleAssignment::new(scope.clone(), &grant.user_id, grant.role, grant.user_type, caller);
            Ok(self.roles.upsert_user_role(assignment).await?)
        }
        .await;

        let detail = json!({ "user_id": grant.user_id, "role": grant.role });
        self.audited("assign_system_user_role", caller, scope, detail, result)
            .await
    }

    /// Assign one role to many users in a single repository call. An
    /// all-failed batch is still `Ok`.
    #[instrument(skip(self, batch), fields(targets = batch.user_ids.len()))]
    pub async fn batch_assign_system_user_roles(
        &self,
        caller: &str,
        namespace: &str,
        batch: BatchGrant,
    ) -> Result<BatchMutationResult, AuthzError> {
        require(namespace, "namespace")?;
        require_batch(&batch)?;

        let scope = RoleScope::system(namespace);
        let assignments = batch
            .user_ids
            .iter()
            .map(|u| RoleAssignment::new(scope.clone(), u, batch.role, batch.user_type, caller))
            .collect();
        let result = self
            .roles
            .bulk_upsert_user_roles(assignments)
            .await
            .map_err(AuthzError::from);

        let detail = batch_detail(&batch, &result);
        self.audited("batch_assign_system_user_roles", caller, scope, detail, result)
            .await
    }

    /// Remove `user_id`'s role in `namespace`. Already absent is success.
    #[instrument(skip(self))]
    pub async fn delete_system_user_role(
        &self,
        caller: &str,
        namespace: &str,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        require(namespace, "namespace")?;
        require(user_id, "user_id")?;

        let scope = RoleScope::system(namespace);
        let key = RoleKey::new(scope.clone(), user_id);
        let result: Result<bool, AuthzError> = async {
            self.guard_sole_system_owner(namespace, user_id).await?;
            self.delete_idempotent(&key, caller).await
        }
        .await;

        let detail = json!({ "user_id": user_id, "already_absent": result.as_ref().ok() });
        self.audited("delete_system_user_role", caller, scope, detail, result.map(|_| ()))
            .await
    }

    /// `Ok(true)` when the record was already absent.
    async fn delete_idempotent(&self, key: &RoleKey, caller: &str) -> Result<bool, AuthzError> {
        match self.roles.delete_user_role(key, caller).await {
            Ok(()) => Ok(false),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// The active owner, or `None`. Absence is not an error.
    pub async fn get_system_owner(&self, namespace: &str) -> Result<Option<RoleAssignment>, AuthzError> {
        require(namespace, "namespace")?;
        Ok(self.roles.get_system_owner(namespace).await?)
    }

    pub async fn list_system_user_roles(
        &self,
        namespace: &str,
        roles: Vec<Role>,
    ) -> Result<Vec<RoleAssignment>, AuthzError> {
        require(namespace, "namespace")?;
        let mut filter = RoleFilter::for_namespace(namespace);
        filter.roles = roles;
        Ok(self.roles.find_user_roles(&filter).await?)
    }

    // ---------------------------------------------------------------------
    // Resource scope
    // ---------------------------------------------------------------------

    /// Claim the owner slot of a new resource for the caller.
    ///
    /// Nested resources also need `resource.{parent}.add_widget` on the parent.
    #[instrument(skip(self))]
    pub async fn create_resource_owner(
        &self,
        caller: &str,
        resource: &ResourceRef,
        parent_id: Option<&str>,
        user_type: UserType,
    ) -> Result<RoleAssignment, AuthzError> {
        require(&resource.id, "resource_id")?;
        let parent = nested_parent(resource, parent_id)?;

        let scope = RoleScope::resource(resource.clone());
        let result: Result<RoleAssignment, AuthzError> = async {
            if let Some(parent) = &parent {
                let permission = format!("resource.{}.add_widget", parent.resource_type);
                if !self
                    .check_explicit_resource_permission(caller, parent, &permission)
                    .await?
                {
                    return Err(AuthzError::forbidden(format!(
                        "permission '{}' denied",
                        permission
                    )));
                }
            }
            let owner = RoleAssignment::new(scope.clone(), caller, Role::Owner, user_type, caller)
                .with_parent(parent.as_ref().map(|p| p.id.clone()));
            Ok(self.roles.create_user_role(owner).await?)
        }
        .await;

        let detail = json!({ "user_id": caller, "role": Role::Owner, "parent_resource_id": parent_id });
        self.audited("create_resource_owner", caller, scope, detail, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn transfer_resource_owner(
        &self,
        caller: &str,
        resource: &ResourceRef,
        new_owner_id: &str,
        user_type: UserType,
    ) -> Result<RoleAssignment, AuthzError> {
        require(&resource.id, "resource_id")?;
        require(new_owner_id, "user_id")?;

        let mut filter = RoleFilter::for_resource(resource.clone());
        filter.roles = vec![Role::Owner];
        let current = self.roles.find_user_roles(&filter).await?.into_iter().next();
        if current.as_ref().map(|c| c.user_id.as_str()) == Some(new_owner_id) {
            return Err(AuthzError::validation("user is already the owner"));
        }

        let scope = RoleScope::resource(resource.clone());
        let detail = json!({
            "from": current.as_ref().map(|c| c.user_id.clone()),
            "to": new_owner_id,
        });
        let result = match current {
            None => Err(AuthzError::forbidden("resource has no owner to transfer from")),
            Some(current) => {
                let new_owner =
                    RoleAssignment::new(scope.clone(), new_owner_id, Role::Owner, user_type, caller)
                        .with_parent(current.parent_resource_id.clone());
                self.roles
                    .transfer_resource_owner(resource, &current.user_id, new_owner.clone())
                    .await
                    .map(|()| new_owner)
                    .map_err(transfer_error)
            }
        };
        self.audited("transfer_resource_owner", caller, scope, detail, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn assign_resource_user_role(
        &self,
        caller: &str,
        resource: &ResourceRef,
        parent_id: Option<&str>,
        grant: Grant,
    ) -> Result<RoleAssignment, AuthzError> {
        require(&resource.id, "resource_id")?;
        require(&grant.user_id, "user_id")?;
        require_assignable(grant.role)?;
        let parent = nested_parent(resource, parent_id)?;

        let scope = RoleScope::resource(resource.clone());
        let result: Result<RoleAssignment, AuthzError> = async {
            self.guard_sole_resource_owner(resource, &grant.user_id).await?;
            let assignment =
                RoleAssignment::new(scope.clone(), &grant.user_id, grant.role, grant.user_type, caller)
                    .with_parent(parent.map(|p| p.id));
            Ok(self.roles.upsert_user_role(assignment).await?)
        }
        .await;

        let detail = json!({ "user_id": grant.user_id, "role": grant.role });
        self.audited("assign_resource_user_role", caller, scope, detail, result)
            .await
    }

    #[instrument(skip(self, batch), fields(targets = batch.user_ids.len()))]
    pub async fn batch_assign_resource_user_roles(
        &self,
        caller: &str,
        resource: &ResourceRef,
        parent_id: Option<&str>,
        batch: BatchGrant,
    ) -> Result<BatchMutationResult, AuthzError> {
        require(&resource.id, "resource_id")?;
        require_batch(&batch)?;
        let parent_id = nested_parent(resource, parent_id)?.map(|p| p.id);

        let scope = RoleScope::resource(resource.clone());
        let assignments = batch
            .user_ids
            .iter()
            .map(|u| {
                RoleAssignment::new(scope.clone(), u, batch.role, batch.user_type, caller)
                    .with_parent(parent_id.clone())
            })
            .collect();
        let result = self
            .roles
            .bulk_upsert_user_roles(assignments)
            .await
            .map_err(AuthzError::from);

        let detail = batch_detail(&batch, &result);
        self.audited("batch_assign_resource_user_roles", caller, scope, detail, result)
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_resource_user_role(
        &self,
        caller: &str,
        resource: &ResourceRef,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        require(&resource.id, "resource_id")?;
        require(user_id, "user_id")?;

        let scope = RoleScope::resource(resource.clone());
        let key = RoleKey::new(scope.clone(), user_id);
        let result: Result<bool, AuthzError> = async {
            self.guard_sole_resource_owner(resource, user_id).await?;
            self.delete_idempotent(&key, caller).await
        }
        .await;

        let detail = json!({ "user_id": user_id, "already_absent": result.as_ref().ok() });
        self.audited("delete_resource_user_role", caller, scope, detail, result.map(|_| ()))
            .await
    }

    /// Soft-delete every role on the resource and on resources nested under it.
    #[instrument(skip(self))]
    pub async fn delete_resource(&self, caller: &str, resource: &ResourceRef) -> Result<u64, AuthzError> {
        require(&resource.id, "resource_id")?;

        let scope = RoleScope::resource(resource.clone());
        let result = self
            .roles
            .soft_delete_resource_user_roles(resource, caller)
            .await
            .map_err(AuthzError::from);

        let detail = json!({ "deleted": result.as_ref().ok() });
        self.audited("delete_resource", caller, scope, detail, result)
            .await
    }

    pub async fn list_resource_user_roles(
        &self,
        resource: &ResourceRef,
        roles: Vec<Role>,
    ) -> Result<Vec<RoleAssignment>, AuthzError> {
        require(&resource.id, "resource_id")?;
        let mut filter = RoleFilter::for_resource(resource.clone());
        filter.roles = roles;
        Ok(self.roles.find_user_roles(&filter).await?)
    }

    // ---------------------------------------------------------------------
    // Caller-centric reads
    // ---------------------------------------------------------------------

    /// The caller's own active roles, optionally narrowed to one scope.
    pub async fn list_my_roles(
        &self,
        caller: &str,
        mut filter: RoleFilter,
    ) -> Result<Vec<RoleAssignment>, AuthzError> {
        if filter.namespace.is_some() && filter.resource.is_some() {
            return Err(AuthzError::validation(
                "namespace and resource filters are mutually exclusive",
            ));
        }
        filter.user_id = Some(caller.to_string());
        Ok(self.roles.find_user_roles(&filter).await?)
    }

    pub async fn find_history(&self, filter: HistoryFilter) -> Result<HistoryPage, AuthzError> {
        self.history.find_history(filter).await
    }
}
