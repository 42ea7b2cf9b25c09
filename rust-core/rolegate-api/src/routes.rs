// SPDX-License-Identifier: PMPL-1.0-or-later
//! Route Config Builder.
//!
//! Each gated HTTP route is declared once as a [`RouteDescriptor`]. At boot
//! the builder asks the policy engine for the operation's rules and expands
//! the descriptor into one [`RouteConfig`] candidate per rule, in rule order.
//! The resulting [`RouteTable`] is keyed by `"{METHOD}:{path template}"` and
//! never changes afterwards.

use std::collections::{BTreeMap, HashMap};

use axum::http::Method;
use tracing::{debug, info};

use rolegate_model::CheckScope;
use rolegate_policy::{keys, PermissionTemplate, PolicyEngine, PolicyError};

use crate::params::ParamSource;

/// Static description of one gated route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub method: Method,
    pub path: &'static str,
    pub entity: &'static str,
    pub operation: &'static str,
    /// Context key to where its value is read from.
    pub params: &'static [(&'static str, ParamSource)],
    /// Fixed conditions ANDed with every rule's conditions.
    pub condition_match: &'static [(&'static str, &'static str)],
    /// `false` for operations no existing role can gate yet.
    pub gated: bool,
    /// Context keys the operation itself needs, beyond those its scope implies.
    pub required: &'static [&'static str],
    /// Body fields that must be non-empty arrays of strings.
    pub required_lists: &'static [&'static str],
    pub namespace_required: bool,
    pub resource_id_required: bool,
    pub parent_resource_required: bool,
}

impl RouteDescriptor {
    fn new(method: Method, path: &'static str, entity: &'static str, operation: &'static str) -> Self {
        Self {
            method,
            path,
            entity,
            operation,
            params: &[],
            condition_match: &[],
            gated: true,
            required: &[],
            required_lists: &[],
            namespace_required: false,
            resource_id_required: false,
            parent_resource_required: false,
        }
    }

    fn params(mut self, params: &'static [(&'static str, ParamSource)]) -> Self {
        self.params = params;
        self
    }

    fn requires(mut self, keys: &'static [&'static str]) -> Self {
        self.required = keys;
        self
    }

    fn requires_list(mut self, fields: &'static [&'static str]) -> Self {
        self.required_lists = fields;
        self
    }

    fn ungated(mut self) -> Self {
        self.gated = false;
        self
    }

    fn namespace_required(mut self) -> Self {
        self.namespace_required = true;
        self
    }

    fn resource_id_required(mut self) -> Self {
        self.resource_id_required = true;
        self
    }

    fn parent_resource_required(mut self) -> Self {
        self.parent_resource_required = true;
        self
    }

    pub fn key(&self) -> String {
        route_key(&self.method, self.path)
    }
}

/// One candidate the middleware tests against a request.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub method: Method,
    pub path: &'static str,
    pub entity: String,
    pub operation: &'static str,
    pub param_sources: &'static [(&'static str, ParamSource)],
    pub condition_match: BTreeMap<String, String>,
    /// `None` on ungated candidates.
    pub permission_template: Option<PermissionTemplate>,
    pub check_scope: CheckScope,
    pub required: &'static [&'static str],
    pub required_lists: &'static [&'static str],
    pub namespace_required: bool,
    pub resource_id_required: bool,
    pub parent_resource_required: bool,
}

impl RouteConfig {
    /// Context keys whose values must be present.
    pub fn required_keys(&self) -> Vec<&'static str> {
        let mut required = Vec::new();
        if self.namespace_required {
            required.push(keys::NAMESPACE);
        }
        if self.resource_id_required {
            required.push(keys::RESOURCE_ID);
        }
        if self.parent_resource_required {
            required.push(keys::PARENT_RESOURCE_ID);
        }
        for &key in self.required {
            if !required.contains(&key) {
                required.push(key);
            }
        }
        required
    }
}

pub fn route_key(method: &Method, path: &str) -> String {
    format!("{}:{}", method.as_str(), path)
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Vec<RouteConfig>>,
}

impl RouteTable {
    /// Expand `descriptors` against the engine. Fails on an operation the
    /// engine has no rules for.
    pub fn build(engine: &PolicyEngine, descriptors: &[RouteDescriptor]) -> Result<Self, PolicyError> {
        let mut routes: HashMap<String, Vec<RouteConfig>> = HashMap::new();

        for descriptor in descriptors {
            let fixed: BTreeMap<String, String> = descriptor
                .condition_match
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            let candidates = if descriptor.gated {
                engine
                    .rules(descriptor.operation)?
                    .iter()
                    .map(|rule| {
                        let mut condition_match = fixed.clone();
                        condition_match.extend(rule.conditions.clone());
                        RouteConfig {
                            method: descriptor.method.clone(),
                            path: descriptor.path,
                            entity: rule.entity.clone(),
                            operation: descriptor.operation,
                            param_sources: descriptor.params,
                            condition_match,
                            permission_template: Some(rule.template.clone()),
                            check_scope: rule.scope,
                            required: descriptor.required,
                            required_lists: descriptor.required_lists,
                            namespace_required: descriptor.namespace_required
                                || rule.scope == CheckScope::System,
                            resource_id_required: descriptor.resource_id_required
                                || rule.scope == CheckScope::Resource,
                            parent_resource_required: descriptor.parent_resource_required
                                || rule.scope == CheckScope::ParentResource,
                        }
                    })
                    .collect()
            } else {
                vec![RouteConfig {
                    method: descriptor.method.clone(),
                    path: descriptor.path,
                    entity: descriptor.entity.to_string(),
                    operation: descriptor.operation,
                    param_sources: descriptor.params,
                    condition_match: fixed,
                    permission_template: None,
                    check_scope: CheckScope::None,
                    required: descriptor.required,
                    required_lists: descriptor.required_lists,
                    namespace_required: descriptor.namespace_required,
                    resource_id_required: descriptor.resource_id_required,
                    parent_resource_required: descriptor.parent_resource_required,
                }]
            };

            debug!(
                route = %descriptor.key(),
                operation = descriptor.operation,
                candidates = candidates.len(),
                "Route expanded"
            );
            routes.entry(descriptor.key()).or_default().extend(candidates);
        }

        info!(routes = routes.len(), "Route table built");
        Ok(Self { routes })
    }

    pub fn standard(engine: &PolicyEngine) -> Result<Self, PolicyError> {
        Self::build(engine, &descriptors())
    }

    pub fn candidates(&self, method: &Method, path: &str) -> Option<&[RouteConfig]> {
        self.routes.get(&route_key(method, path)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

const SYSTEM: &[(&str, ParamSource)] = &[(keys::NAMESPACE, ParamSource::Path("namespace"))];

const SYSTEM_WITH_USER: &[(&str, ParamSource)] = &[
    (keys::NAMESPACE, ParamSource::Path("namespace")),
    (keys::USER_ID, ParamSource::Body("user_id")),
];

const SYSTEM_GRANT: &[(&str, ParamSource)] = &[
    (keys::NAMESPACE, ParamSource::Path("namespace")),
    (keys::USER_ID, ParamSource::Body("user_id")),
    (keys::ROLE, ParamSource::Body("role")),
];

const SYSTEM_BATCH: &[(&str, ParamSource)] = &[
    (keys::NAMESPACE, ParamSource::Path("namespace")),
    (keys::ROLE, ParamSource::Body("role")),
];

const SYSTEM_MEMBER: &[(&str, ParamSource)] = &[
    (keys::NAMESPACE, ParamSource::Path("namespace")),
    (keys::USER_ID, ParamSource::Path("user_id")),
];

const RESOURCE_BODY: &[(&str, ParamSource)] = &[
    (keys::RESOURCE_ID, ParamSource::Body("resource_id")),
    (keys::RESOURCE_TYPE, ParamSource::Body("resource_type")),
    (keys::PARENT_RESOURCE_ID, ParamSource::Body("parent_resource_id")),
    (keys::PARENT_RESOURCE_TYPE, ParamSource::Body("parent_resource_type")),
    (keys::USER_ID, ParamSource::Body("user_id")),
    (keys::ROLE, ParamSource::Body("role")),
];

const RESOURCE_QUERY: &[(&str, ParamSource)] = &[
    (keys::RESOURCE_ID, ParamSource::Query("resource_id")),
    (keys::RESOURCE_TYPE, ParamSource::Query("resource_type")),
    (keys::PARENT_RESOURCE_ID, ParamSource::Query("parent_resource_id")),
    (keys::PARENT_RESOURCE_TYPE, ParamSource::Query("parent_resource_type")),
    (keys::USER_ID, ParamSource::Query("user_id")),
];

const ACCESSIBLE: &[(&str, ParamSource)] = &[
    (keys::RESOURCE_TYPE, ParamSource::Body("resource_type")),
    (keys::PARENT_RESOURCE_ID, ParamSource::Body("parent_resource_id")),
    (keys::PARENT_RESOURCE_TYPE, ParamSource::Body("parent_resource_type")),
];

const USER: &[&str] = &[keys::USER_ID];
const ROLE: &[&str] = &[keys::ROLE];
const USER_AND_ROLE: &[&str] = &[keys::USER_ID, keys::ROLE];
const USER_IDS: &[&str] = &["user_ids"];

/// Every gated route the server mounts.
pub fn descriptors() -> Vec<RouteDescriptor> {
    use RouteDescriptor as R;

    vec![
        R::new(Method::POST, "/systems/{namespace}/owner", "system", "create_system_owner")
            .params(SYSTEM_WITH_USER)
            .requires(USER)
            .namespace_required(),
        R::new(Method::GET, "/systems/{namespace}/owner", "system", "get_system_owner").params(SYSTEM),
        R::new(Method::PUT, "/systems/{namespace}/owner", "system", "transfer_system_owner")
            .params(SYSTEM_WITH_USER)
            .requires(USER),
        R::new(Method::GET, "/systems/{namespace}/roles", "system", "list_system_user_roles")
            .params(SYSTEM),
        R::new(Method::POST, "/systems/{namespace}/roles", "system", "assign_system_user_role")
            .params(SYSTEM_GRANT)
            .requires(USER_AND_ROLE),
        R::new(
            Method::POST,
            "/systems/{namespace}/roles/batch",
            "system",
            "batch_assign_system_user_roles",
        )
        .params(SYSTEM_BATCH)
        .requires(ROLE)
        .requires_list(USER_IDS),
        R::new(
            Method::DELETE,
            "/systems/{namespace}/roles/{user_id}",
            "system",
            "delete_system_user_role",
        )
        .params(SYSTEM_MEMBER)
        .requires(USER),
        R::new(Method::GET, "/systems/{namespace}/history", "system", "list_system_history")
            .params(SYSTEM),
        R::new(Method::POST, "/resources/owner", "resource", "create_resource_owner")
            .params(RESOURCE_BODY)
            .ungated()
            .resource_id_required(),
        R::new(Method::PUT, "/resources/owner", "resource", "transfer_resource_owner")
            .params(RESOURCE_BODY)
            .requires(USER),
        R::new(Method::GET, "/resources/roles", "resource", "list_resource_user_roles")
            .params(RESOURCE_QUERY),
        R::new(Method::POST, "/resources/roles", "resource", "assign_resource_user_role")
            .params(RESOURCE_BODY)
            .requires(USER_AND_ROLE),
        R::new(
            Method::POST,
            "/resources/roles/batch",
            "resource",
            "batch_assign_resource_user_roles",
        )
        .params(RESOURCE_BODY)
        .requires(ROLE)
        .requires_list(USER_IDS),
        R::new(Method::DELETE, "/resources/roles", "resource", "delete_resource_user_role")
            .params(RESOURCE_QUERY)
            .requires(USER),
        R::new(Method::DELETE, "/resources", "resource", "delete_resource").params(RESOURCE_QUERY),
        R::new(Method::GET, "/resources/history", "resource", "list_resource_history")
            .params(RESOURCE_QUERY),
        R::new(Method::POST, "/resources/accessible", "resource", "list_accessible_resources")
            .params(ACCESSIBLE)
            .parent_resource_required(),
        R::new(Method::GET, "/me/roles", "user", "list_my_roles").ungated(),
        R::new(Method::POST, "/permissions/check", "user", "check_permission").ungated(),
    ]
}
