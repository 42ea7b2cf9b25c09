// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for permission resolution and ownership invariants

use std::sync::Arc;

use proptest::prelude::*;
use rolegate_authz::{Grant, HistoryRecorder, PermissionService};
use rolegate_model::{ResourceRef, ResourceType, Role, RoleAssignment, RoleFilter, RoleScope, UserType};
use rolegate_policy::PolicyEngine;
use rolegate_store::{InMemoryHistoryRepository, InMemoryRoleRepository, RoleRepository};

fn service(repo: Arc<InMemoryRoleRepository>) -> PermissionService {
    PermissionService::new(
        repo,
        Arc::new(PolicyEngine::embedded().unwrap()),
        HistoryRecorder::new(Arc::new(InMemoryHistoryRepository::new())),
    )
}

fn arb_user_id() -> impl Strategy<Value = String> {
    "[a-z]{3,8}"
}

fn arb_scoped_role() -> impl Strategy<Value = Option<Role>> {
    prop_oneof![
        Just(None),
        Just(Some(Role::Owner)),
        Just(Some(Role::Admin)),
        Just(Some(Role::Editor)),
        Just(Some(Role::Viewer)),
    ]
}

fn arb_assignable_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::Editor), Just(Role::Viewer)]
}

fn arb_permission() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "resource.dashboard_widget.read",
        "resource.dashboard_widget.list_members",
        "resource.dashboard_widget.delete",
        "resource.dashboard_widget.transfer_owner",
    ])
}

async fn put(repo: &InMemoryRoleRepository, resource: &ResourceRef, user: &str, role: Role) {
    let parent = resource.resource_type.parent().map(|_| "d1".to_string());
    repo.upsert_user_role(
        RoleAssignment::new(RoleScope::resource(resource.clone()), user, role, UserType::Individual, "root")
            .with_parent(parent),
    )
    .await
    .unwrap();
}

proptest! {
    /// With no explicit roles on the child the parent role decides; with any
    /// explicit role only the child's own records count.
    #[test]
    fn test_inheritance_versus_whitelist(
        parent_role in arb_scoped_role(),
        child_role in arb_scoped_role(),
        other_on_child in any::<bool>(),
        permission in arb_permission()
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dashboard = ResourceRef::new("d1", ResourceType::Dashboard);
            let widget = ResourceRef::new("w1", ResourceType::DashboardWidget);
            let repo = Arc::new(InMemoryRoleRepository::new());

            if let Some(role) = parent_role {
                put(&repo, &dashboard, "caller", role).await;
            }
            if let Some(role) = child_role {
                put(&repo, &widget, "caller", role).await;
            }
            if other_on_child {
                put(&repo, &widget, "someone-else", Role::Viewer).await;
            }

            let svc = service(repo.clone());
            let granted = svc.engine().roles_with_permission(permission);
            let explicit = repo.count_resource_roles(&widget).await.unwrap();

            let expected = if explicit == 0 {
                parent_role.map(|r| granted.contains(&r)).unwrap_or(false)
            } else {
                child_role.map(|r| granted.contains(&r)).unwrap_or(false)
            };

            let actual = svc
                .check_resource_permission("caller", &widget, Some("d1"), permission)
                .await
                .unwrap();
            prop_assert_eq!(actual, expected);

            Ok(())
        })?;
    }

    #[test]
    fn test_delete_is_idempotent(
        user in arb_user_id(),
        role in arb_assignable_role(),
        repeats in 1usize..4
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo = Arc::new(InMemoryRoleRepository::new());
            let svc = service(repo.clone());
            svc.assign_system_user_role(
                "admin",
                "ns",
                Grant { user_id: user.clone(), role, user_type: UserType::Individual },
            )
            .await
            .unwrap();

            for _ in 0..=repeats {
                prop_assert!(svc.delete_system_user_role("admin", "ns", &user).await.is_ok());
            }
            prop_assert!(!repo.has_system_role(&user, "ns", role).await.unwrap());

            Ok(())
        })?;
    }

    #[test]
    fn test_transfer_chain_keeps_exactly_one_owner(
        chain in prop::collection::vec(arb_user_id(), 1..8)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo = Arc::new(InMemoryRoleRepository::new());
            let svc = service(repo.clone());
            svc.create_system_owner("mod", "ns", "founder", UserType::Individual)
                .await
                .unwrap();

            let mut owner = "founder".to_string();
            for next in chain {
                let result = svc
                    .transfer_system_owner(&owner, "ns", &next, UserType::Individual)
                    .await;
                if next == owner {
                    prop_assert!(result.unwrap_err().is_validation());
                } else {
                    prop_assert!(result.is_ok());
                    owner = next;
                }
                prop_assert_eq!(repo.count_system_owners("ns").await.unwrap(), 1);
                let current = svc.get_system_owner("ns").await.unwrap().unwrap();
                prop_assert_eq!(&current.user_id, &owner);
            }

            Ok(())
        })?;
    }

    #[test]
    fn test_assigned_role_round_trips_through_my_roles(
        users in prop::collection::btree_set(arb_user_id(), 1..6),
        role in arb_assignable_role()
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let svc = service(Arc::new(InMemoryRoleRepository::new()));
            for user in &users {
                svc.assign_system_user_role(
                    "admin",
                    "ns",
                    Grant { user_id: user.clone(), role, user_type: UserType::Individual },
                )
                .await
                .unwrap();
            }

            for user in &users {
                let mine = svc.list_my_roles(user, RoleFilter::for_namespace("ns")).await.unwrap();
                prop_assert_eq!(mine.len(), 1);
                prop_assert_eq!(&mine[0].user_id, user);
                prop_assert_eq!(mine[0].role, role);
            }

            Ok(())
        })?;
    }
}
