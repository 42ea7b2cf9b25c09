// SPDX-License-Identifier: PMPL-1.0-or-later
//! Route handlers.
//!
//! Handlers run after the middleware has authorized the request; they read
//! the caller and target from [`RequestContext`] and call the service.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use rolegate_authz::{AccessTarget, BatchGrant, Grant, HistoryPage};
use rolegate_model::{
    BatchMutationResult, HistoryFilter, HistoryTarget, ResourceRef, ResourceType, Role,
    RoleAssignment, RoleFilter, UserType,
};
use rolegate_policy::keys;

use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body naming a user to become owner.
#[derive(Debug, Deserialize)]
pub struct OwnerRequest {
    pub user_id: String,
    #[serde(default)]
    pub user_type: UserType,
}

/// Body for claiming the first owner of a resource. The caller becomes owner.
#[derive(Debug, Default, Deserialize)]
pub struct ClaimOwnerRequest {
    #[serde(default)]
    pub user_type: UserType,
}

#[derive(Debug, Default, Deserialize)]
pub struct RolesQuery {
    /// Comma-separated roles; empty means any.
    pub roles: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Comma-separated child ids whose history is folded in.
    pub descendant_ids: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyRolesQuery {
    pub namespace: Option<String>,
    pub resource_id: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub roles: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessibleRequest {
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessibleResponse {
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    pub permission: String,
    pub namespace: Option<String>,
    pub resource_id: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub parent_resource_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
}

fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.map(|r| r.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn parse_roles(raw: Option<&str>) -> Result<Vec<Role>, ApiError> {
    split_list(raw)
        .into_iter()
        .map(|r| r.parse::<Role>().map_err(ApiError::from))
        .collect()
}

fn history_filter(target: HistoryTarget, query: &HistoryQuery) -> HistoryFilter {
    let mut filter = HistoryFilter::new(target);
    if let Some(page) = query.page {
        filter.page = page;
    }
    if let Some(page_size) = query.page_size {
        filter.page_size = page_size;
    }
    filter
}

/// Health check handler
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn create_system_owner(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<OwnerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoleAssignment>), ApiError> {
    let Json(body) = body?;
    let owner = state
        .service
        .create_system_owner(&ctx.caller, ctx.namespace()?, &body.user_id, body.user_type)
        .await?;
    Ok((StatusCode::CREATED, Json(owner)))
}

#[instrument(skip(state, ctx), fields(caller = %ctx.caller))]
pub async fn get_system_owner(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Option<RoleAssignment>>, ApiError> {
    let owner = state.service.get_system_owner(ctx.namespace()?).await?;
    Ok(Json(owner))
}

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn transfer_system_owner(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<OwnerRequest>, JsonRejection>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let Json(body) = body?;
    let owner = state
        .service
        .transfer_system_owner(&ctx.caller, ctx.namespace()?, &body.user_id, body.user_type)
        .await?;
    Ok(Json(owner))
}

#[instrument(skip(state, ctx, query), fields(caller = %ctx.caller))]
pub async fn list_system_user_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<RolesQuery>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, ApiError> {
    let Query(query) = query?;
    let roles = parse_roles(query.roles.as_deref())?;
    let assignments = state
        .service
        .list_system_user_roles(ctx.namespace()?, roles)
        .await?;
    Ok(Json(assignments))
}

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn assign_system_user_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<Grant>, JsonRejection>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let Json(grant) = body?;
    let assignment = state
        .service
        .assign_system_user_role(&ctx.caller, ctx.namespace()?, grant)
        .await?;
    Ok(Json(assignment))
}

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn batch_assign_system_user_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<BatchGrant>, JsonRejection>,
) -> Result<Json<BatchMutationResult>, ApiError> {
    let Json(batch) = body?;
    let result = state
        .service
        .batch_assign_system_user_roles(&ctx.caller, ctx.namespace()?, batch)
        .await?;
    Ok(Json(result))
}

#[instrument(skip(state, ctx), fields(caller = %ctx.caller))]
pub async fn delete_system_user_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_system_user_role(&ctx.caller, ctx.namespace()?, ctx.param(keys::USER_ID)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, ctx, query), fields(caller = %ctx.caller))]
pub async fn list_system_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryPage>, ApiError> {
    let Query(query) = query?;
    let target = HistoryTarget::System {
        namespace: ctx.namespace()?.to_string(),
    };
    let page = state
        .service
        .find_history(history_filter(target, &query))
        .await?;
    Ok(Json(page))
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn create_resource_owner(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<ClaimOwnerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoleAssignment>), ApiError> {
    let Json(body) = body?;
    let owner = state
        .service
        .create_resource_owner(&ctx.caller, ctx.resource()?, ctx.parent_id(), body.user_type)
        .await?;
    Ok((StatusCode::CREATED, Json(owner)))
}

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn transfer_resource_owner(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<OwnerRequest>, JsonRejection>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let Json(body) = body?;
    let owner = state
        .service
        .transfer_resource_owner(&ctx.caller, ctx.resource()?, &body.user_id, body.user_type)
        .await?;
    Ok(Json(owner))
}

#[instrument(skip(state, ctx, query), fields(caller = %ctx.caller))]
pub async fn list_resource_user_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<RolesQuery>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, ApiError> {
    let Query(query) = query?;
    let roles = parse_roles(query.roles.as_deref())?;
    let assignments = state
        .service
        .list_resource_user_roles(ctx.resource()?, roles)
        .await?;
    Ok(Json(assignments))
}

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn assign_resource_user_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<Grant>, JsonRejection>,
) -> Result<Json<RoleAssignment>, ApiError> {
    let Json(grant) = body?;
    let assignment = state
        .service
        .assign_resource_user_role(&ctx.caller, ctx.resource()?, ctx.parent_id(), grant)
        .await?;
    Ok(Json(assignment))
}

#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn batch_assign_resource_user_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<BatchGrant>, JsonRejection>,
) -> Result<Json<BatchMutationResult>, ApiError> {
    let Json(batch) = body?;
    let result = state
        .service
        .batch_assign_resource_user_roles(&ctx.caller, ctx.resource()?, ctx.parent_id(), batch)
        .await?;
    Ok(Json(result))
}

#[instrument(skip(state, ctx), fields(caller = %ctx.caller))]
pub async fn delete_resource_user_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_resource_user_role(&ctx.caller, ctx.resource()?, ctx.param(keys::USER_ID)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, ctx), fields(caller = %ctx.caller))]
pub async fn delete_resource(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state
        .service
        .delete_resource(&ctx.caller, ctx.resource()?)
        .await?;
    Ok(Json(DeletedResponse { deleted }))
}

#[instrument(skip(state, ctx, query), fields(caller = %ctx.caller))]
pub async fn list_resource_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryPage>, ApiError> {
    let Query(query) = query?;
    let target = HistoryTarget::Resource {
        resource: ctx.resource()?.clone(),
        descendant_ids: split_list(query.descendant_ids.as_deref())
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    let page = state
        .service
        .find_history(history_filter(target, &query))
        .await?;
    Ok(Json(page))
}

/// Children of one parent the caller may read, in request order.
///
/// The route carries no up-front gate; every child is checked on its own, so
/// a caller whitelisted on a child sees it without any role on the parent.
#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn list_accessible_resources(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<AccessibleRequest>, JsonRejection>,
) -> Result<Json<AccessibleResponse>, ApiError> {
    let Json(body) = body?;
    let child_type = ctx
        .resource_type
        .ok_or_else(|| ApiError::BadRequest("resource_type is required".to_string()))?;
    let permission = ctx
        .permission
        .clone()
        .unwrap_or_else(|| format!("resource.{}.read", child_type));
    let resource_ids = state
        .service
        .filter_accessible_resources(&ctx.caller, ctx.parent()?, child_type, body.resource_ids, &permission)
        .await?;
    Ok(Json(AccessibleResponse { resource_ids }))
}

// ---------------------------------------------------------------------------
// Caller-centric
// ---------------------------------------------------------------------------

#[instrument(skip(state, ctx, query), fields(caller = %ctx.caller))]
pub async fn list_my_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<MyRolesQuery>, QueryRejection>,
) -> Result<Json<Vec<RoleAssignment>>, ApiError> {
    let Query(query) = query?;
    let resource = match (query.resource_id, query.resource_type) {
        (Some(id), Some(t)) => Some(ResourceRef::new(id, t)),
        (Some(_), None) => {
            return Err(ApiError::BadRequest("resource_type is required".to_string()))
        }
        (None, _) => None,
    };
    let filter = RoleFilter {
        namespace: query.namespace,
        resource,
        user_id: None,
        roles: parse_roles(query.roles.as_deref())?,
    };
    let roles = state.service.list_my_roles(&ctx.caller, filter).await?;
    Ok(Json(roles))
}

/// Side-effect-free permission predicate for other services.
#[instrument(skip(state, ctx, body), fields(caller = %ctx.caller))]
pub async fn check_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<CheckPermissionRequest>, JsonRejection>,
) -> Result<Json<CheckPermissionResponse>, ApiError> {
    let Json(body) = body?;
    if body.permission.trim().is_empty() {
        return Err(ApiError::BadRequest("permission is required".to_string()));
    }

    let resource = match (body.resource_id, body.resource_type) {
        (Some(id), Some(t)) => Some(ResourceRef::new(id, t)),
        (Some(_), None) => {
            return Err(ApiError::BadRequest("resource_type is required".to_string()))
        }
        (None, _) => None,
    };
    let parent = match (&resource, body.parent_resource_id) {
        (Some(r), Some(id)) => r.resource_type.parent().map(|t| ResourceRef::new(id, t)),
        _ => None,
    };
    let target = AccessTarget {
        namespace: body.namespace,
        resource,
        parent,
    };

    let allowed = state
        .service
        .check_permission(&ctx.caller, body.permission.trim(), &target)
        .await?;
    Ok(Json(CheckPermissionResponse { allowed }))
}
