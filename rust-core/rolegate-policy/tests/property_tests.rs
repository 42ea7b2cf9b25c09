// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for the operation policy engine

use proptest::prelude::*;
use rolegate_model::{ResourceType, Role};
use rolegate_policy::{PolicyContext, PolicyEngine, PolicyError, PolicyStore};

fn arb_resource_type() -> impl Strategy<Value = ResourceType> {
    prop::sample::select(ResourceType::ALL.to_vec())
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn arb_action() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "transfer_resource_owner",
        "list_resource_user_roles",
        "assign_resource_user_role",
        "batch_assign_resource_user_roles",
        "delete_resource_user_role",
        "delete_resource",
        "list_resource_history",
        "list_accessible_resources",
    ])
}

fn context(rt: ResourceType, role: Role) -> PolicyContext {
    let mut ctx = PolicyContext::new()
        .with("resource_type", rt.as_str())
        .with("role", role.as_str());
    if let Some(parent) = rt.parent() {
        ctx.insert("parent_resource_type", parent.as_str());
    }
    ctx
}

proptest! {
    #[test]
    fn test_resolution_is_deterministic(
        action in arb_action(),
        rt in arb_resource_type(),
        role in arb_role()
    ) {
        let engine = PolicyEngine::embedded().unwrap();
        let ctx = context(rt, role);
        let first = engine.get_permission(action, &ctx);
        let second = engine.get_permission(action, &ctx);
        prop_assert_eq!(format!("{:?}", first), format!("{:?}", second));
    }

    #[test]
    fn test_resolved_permission_never_has_braces(
        action in arb_action(),
        rt in arb_resource_type(),
        role in arb_role()
    ) {
        let engine = PolicyEngine::embedded().unwrap();
        match engine.get_permission(action, &context(rt, role)) {
            Ok((permission, _)) => {
                prop_assert!(!permission.contains(['{', '}']), "braces left in {}", permission);
                prop_assert!(!engine.roles_with_permission(&permission).is_empty(),
                    "{} resolved to ungranted permission {}", action, permission);
            }
            Err(e) => prop_assert!(matches!(e, PolicyError::NoMatchingRule(_))),
        }
    }

    #[test]
    fn test_fallback_always_last_after_merge(
        order in Just(vec![0usize, 1, 2]).prop_shuffle()
    ) {
        let docs = [
            ("a", r#"{"entity":"a","actions":{"op":[{"permission":"a.any"}]}}"#),
            ("b", r#"{"entity":"b","actions":{"op":[{"conditions":{"role":"viewer"},"permission":"b.viewer"}]}}"#),
            ("c", r#"{"entity":"c","actions":{"op":[{"conditions":{"role":"editor"},"permission":"c.editor"}]}}"#),
        ];
        let ordered: Vec<(&str, &str)> = order.iter().map(|&i| docs[i]).collect();
        let store = PolicyStore::from_documents(&ordered).unwrap();
        let rules = store.rules("op").unwrap();
        prop_assert_eq!(rules.len(), 3);
        prop_assert!(rules[2].is_fallback());
        prop_assert!(!rules[0].is_fallback() && !rules[1].is_fallback());
    }
}
