// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation Policy Engine.
//
// Resolves (action, context) to (permission, scope) by scanning the merged
// rule list and taking the first rule whose conditions all hold. Built once at
// boot and shared by reference; it holds no interior mutability.

use std::collections::BTreeSet;

use tracing::trace;

use rolegate_model::{CheckScope, Role};

use crate::context::PolicyContext;
use crate::error::PolicyError;
use crate::matrix::PermissionMatrix;
use crate::rule::PolicyRule;
use crate::store::PolicyStore;

#[derive(Debug, Clone)]
pub struct PolicyEngine {
    store: PolicyStore,
    matrix: PermissionMatrix,
}

impl PolicyEngine {
    pub fn new(store: PolicyStore, matrix: PermissionMatrix) -> Self {
        Self { store, matrix }
    }

    /// Engine over the embedded documents and the standard matrix.
    pub fn embedded() -> Result<Self, PolicyError> {
        Ok(Self::new(PolicyStore::load_embedded()?, PermissionMatrix::standard()))
    }

    /// Ordered rules for `action`.
    pub fn rules(&self, action: &str) -> Result<&[PolicyRule], PolicyError> {
        self.store
            .rules(action)
            .ok_or_else(|| PolicyError::UnknownAction(action.to_string()))
    }

    pub fn knows(&self, action: &str) -> bool {
        self.store.rules(action).is_some()
    }

    /// The first rule for `action` whose conditions hold in `ctx`.
    pub fn resolve(&self, action: &str, ctx: &PolicyContext) -> Result<&PolicyRule, PolicyError> {
        self.rules(action)?
            .iter()
            .find(|rule| rule.matches(ctx))
            .ok_or_else(|| PolicyError::NoMatchingRule(action.to_string()))
    }

    /// Permission string and enforcement scope for `action` in `ctx`.
    pub fn get_permission(
        &self,
        action: &str,
        ctx: &PolicyContext,
    ) -> Result<(String, CheckScope), PolicyError> {
        let rule = self.resolve(action, ctx)?;
        let permission = rule.template.expand(ctx)?;
        trace!(action, permission = %permission, scope = %rule.scope, "Policy resolved");
        Ok((permission, rule.scope))
    }

    pub fn roles_with_permission(&self, permission: &str) -> BTreeSet<Role> {
        self.matrix.roles_with_permission(permission)
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine::embedded().unwrap()
    }

    fn ctx(pairs: &[(&str, &str)]) -> PolicyContext {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_widget_viewer_assignment_is_gated_by_parent() {
        let (permission, scope) = engine()
            .get_permission(
                "assign_resource_user_role",
                &ctx(&[("resource_type", "dashboard_widget"), ("role", "viewer")]),
            )
            .unwrap();
        assert_eq!(permission, "resource.dashboard.add_widget_viewer");
        assert_eq!(scope.as_str(), "parent");
    }

    #[test]
    fn test_dashboard_editor_assignment_needs_add_member() {
        let (permission, scope) = engine()
            .get_permission(
                "assign_resource_user_role",
                &ctx(&[("resource_type", "dashboard"), ("role", "editor")]),
            )
            .unwrap();
        assert_eq!(permission, "resource.dashboard.add_member");
        assert_eq!(scope.as_str(), "resource");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let (permission, _) = engine()
            .get_permission(
                "assign_resource_user_role",
                &ctx(&[("resource_type", "dashboard"), ("role", "viewer")]),
            )
            .unwrap();
        assert_eq!(permission, "resource.dashboard.add_viewer");
    }

    #[test]
    fn test_widget_non_viewer_assignment_has_no_configuration() {
        let err = engine()
            .get_permission(
                "assign_resource_user_role",
                &ctx(&[("resource_type", "dashboard_widget"), ("role", "editor")]),
            )
            .unwrap_err();
        assert!(matches!(err, PolicyError::NoMatchingRule(_)));
    }

    #[test]
    fn test_fallback_expands_template() {
        let e = engine();
        let (permission, scope) = e
            .get_permission("delete_resource", &ctx(&[("resource_type", "library_widget")]))
            .unwrap();
        assert_eq!(permission, "resource.library_widget.delete");
        assert_eq!(scope, CheckScope::Resource);
    }

    #[test]
    fn test_fallback_without_placeholder_value_is_caller_error() {
        let err = engine().get_permission("delete_resource", &PolicyContext::new()).unwrap_err();
        assert!(matches!(err, PolicyError::MissingPlaceholder { .. }));
    }

    #[test]
    fn test_unknown_action() {
        let err = engine().get_permission("launch_rocket", &PolicyContext::new()).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownAction(_)));
    }

    #[test]
    fn test_global_scope_for_owner_creation() {
        let e = engine();
        let (permission, scope) = e
            .get_permission("create_system_owner", &PolicyContext::new())
            .unwrap();
        assert_eq!(scope, CheckScope::Global);
        assert!(e.roles_with_permission(&permission).contains(&Role::Moderator));
    }

    #[test]
    fn test_every_literal_permission_is_in_matrix() {
        let e = engine();
        for action in e.store().actions() {
            for rule in e.rules(action).unwrap() {
                if rule.template.is_literal() {
                    assert!(
                        e.matrix().knows(rule.template.as_str()),
                        "{} -> {} missing from matrix",
                        action,
                        rule.template
                    );
                }
            }
        }
    }
}
