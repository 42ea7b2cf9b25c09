// SPDX-License-Identifier: PMPL-1.0-or-later
//! Request Matching Middleware.
//!
//! Runs on every gated route, in this order:
//!
//! 1. resolve the caller from the identity header (401 when absent);
//! 2. look up the route's candidates by method and matched path;
//! 3. buffer the body and extract each candidate's parameters, taking the
//!    first candidate whose `condition_match` holds (400 when none does);
//! 4. check the candidate's required parameters and non-empty lists (400,
//!    before any repository call);
//! 5. expand the permission and dispatch it on the candidate's scope (403
//!    when denied).
//!
//! On success the handler receives a [`RequestContext`] extension.

use std::collections::HashMap;

use axum::{
    body::{to_bytes, Body},
    extract::{
        rejection::{QueryRejection, RawPathParamsRejection},
        MatchedPath, Query, RawPathParams, Request, State,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::debug;

use rolegate_authz::{AccessTarget, AuthzError};
use rolegate_model::{CheckScope, ResourceRef, ResourceType, Role};
use rolegate_policy::{keys, PolicyContext};

use crate::error::ApiError;
use crate::params::ExtractedParams;
use crate::routes::RouteConfig;
use crate::AppState;

/// Upper bound on buffered request bodies.
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// What the middleware established about an authorized request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: String,
    pub operation: &'static str,
    /// Expanded permission; `None` on ungated routes.
    pub permission: Option<String>,
    pub scope: CheckScope,
    pub target: AccessTarget,
    pub resource_type: Option<ResourceType>,
    pub params: PolicyContext,
}

impl RequestContext {
    pub fn namespace(&self) -> Result<&str, ApiError> {
        self.target
            .namespace
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("namespace is required".to_string()))
    }

    pub fn resource(&self) -> Result<&ResourceRef, ApiError> {
        self.target
            .resource
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("resource_id is required".to_string()))
    }

    pub fn parent(&self) -> Result<&ResourceRef, ApiError> {
        self.target
            .parent
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("parent_resource_id is required".to_string()))
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.target.parent_id()
    }

    pub fn param(&self, key: &str) -> Result<&str, ApiError> {
        self.params
            .get(key)
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", key)))
    }
}

/// Read the caller's id from the trusted identity header.
pub fn extract_identity(request: &Request, header: &str) -> Result<String, ApiError> {
    request
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", header)))
}

/// Authorization middleware for gated routes. Install with `route_layer`.
pub async fn authorize_request(
    State(state): State<AppState>,
    matched: MatchedPath,
    path_params: Result<RawPathParams, RawPathParamsRejection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    request: Request,
    next: Next,
) -> Response {
    match authorize(&state, matched.as_str(), path_params, query, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

async fn authorize(
    state: &AppState,
    matched_path: &str,
    path_params: Result<RawPathParams, RawPathParamsRejection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    request: Request,
) -> Result<Request, ApiError> {
    let caller = extract_identity(&request, &state.config.identity_header)?;

    let method = request.method().clone();
    let candidates = state
        .routes
        .candidates(&method, matched_path)
        .ok_or_else(|| ApiError::Internal(format!("no route config for {} {}", method, matched_path)))?;

    let path: HashMap<String, String> = path_params?
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let Query(query) = query?;

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable request body: {}", e)))?;
    let params = ExtractedParams::new(json_object(&bytes)?, query, path);
    let mut request = Request::from_parts(parts, Body::from(bytes));

    let (route, ctx) = candidates
        .iter()
        .map(|route| (route, policy_context(route, &params)))
        .find(|(route, ctx)| ctx.satisfies(&route.condition_match))
        .ok_or_else(|| {
            ApiError::BadRequest(format!("no matching configuration for {} {}", method, matched_path))
        })?;

    for key in route.required_keys() {
        if !ctx.contains(key) {
            return Err(ApiError::BadRequest(format!("{} is required", key)));
        }
    }
    if let Some(field) = route.required_lists.iter().find(|f| !params.has_items(f)) {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }

    let (target, resource_type) = access_target(&ctx)?;

    let permission = route
        .permission_template
        .as_ref()
        .map(|template| template.expand(&ctx))
        .transpose()
        .map_err(AuthzError::from)?;

    if let Some(permission) = &permission {
        state
            .service
            .authorize(&caller, route.check_scope, &target, permission)
            .await?;
    }

    debug!(
        caller = %caller,
        operation = route.operation,
        permission = permission.as_deref().unwrap_or("-"),
        scope = %route.check_scope,
        "Request authorized"
    );

    request.extensions_mut().insert(RequestContext {
        caller,
        operation: route.operation,
        permission,
        scope: route.check_scope,
        target,
        resource_type,
        params: ctx,
    });
    Ok(request)
}

/// Empty bodies and non-object JSON yield no body parameters.
fn json_object(bytes: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(ApiError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

/// Parameters for one candidate, with the parent type derived from the
/// resource type when the request does not name it.
fn policy_context(route: &RouteConfig, params: &ExtractedParams) -> PolicyContext {
    let mut ctx = params.resolve(route.param_sources);
    if !ctx.contains(keys::PARENT_RESOURCE_TYPE) {
        let parent = ctx
            .get(keys::RESOURCE_TYPE)
            .and_then(|t| t.parse::<ResourceType>().ok())
            .and_then(|t| t.parent());
        if let Some(parent) = parent {
            ctx.insert(keys::PARENT_RESOURCE_TYPE, parent.as_str());
        }
    }
    ctx
}

fn access_target(ctx: &PolicyContext) -> Result<(AccessTarget, Option<ResourceType>), ApiError> {
    if let Some(role) = ctx.get(keys::ROLE) {
        role.parse::<Role>()?;
    }

    let resource_type = ctx
        .get(keys::RESOURCE_TYPE)
        .map(str::parse::<ResourceType>)
        .transpose()?;
    let resource = match (ctx.get(keys::RESOURCE_ID), resource_type) {
        (Some(id), Some(t)) => Some(ResourceRef::new(id, t)),
        (Some(_), None) => {
            return Err(ApiError::BadRequest("resource_type is required".to_string()))
        }
        (None, _) => None,
    };

    let parent_type = ctx
        .get(keys::PARENT_RESOURCE_TYPE)
        .map(str::parse::<ResourceType>)
        .transpose()?;
    let parent = match (ctx.get(keys::PARENT_RESOURCE_ID), parent_type) {
        (Some(id), Some(t)) => Some(ResourceRef::new(id, t)),
        (Some(_), None) => {
            return Err(ApiError::BadRequest(
                "parent_resource_type is required".to_string(),
            ))
        }
        (None, _) => None,
    };

    let target = AccessTarget {
        namespace: ctx.get(keys::NAMESPACE).map(str::to_string),
        resource,
        parent,
    };
    Ok((target, resource_type))
}
