// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end router tests: identity, candidate matching, parameter
//! validation, permission dispatch and the handlers behind them.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rolegate_api::{build_router, ApiConfig, AppState};
use rolegate_authz::{HistoryRecorder, PermissionService};
use rolegate_model::{
    ResourceRef, ResourceType, Role, RoleAssignment, RoleScope, UserType,
};
use rolegate_policy::PolicyEngine;
use rolegate_store::{
    InMemoryHistoryRepository, InMemoryRoleRepository, MeteredRoleRepository, RoleRepository,
};

struct TestApp {
    router: Router,
    roles: Arc<MeteredRoleRepository<InMemoryRoleRepository>>,
    history: Arc<InMemoryHistoryRepository>,
}

impl TestApp {
    async fn new() -> Self {
        let roles = Arc::new(MeteredRoleRepository::new(InMemoryRoleRepository::new()));
        let history = Arc::new(InMemoryHistoryRepository::new());
        let service = PermissionService::new(
            roles.clone(),
            Arc::new(PolicyEngine::embedded().unwrap()),
            HistoryRecorder::new(history.clone()),
        );
        let state = AppState::new(ApiConfig::default(), service).unwrap();
        let app = Self {
            router: build_router(state),
            roles,
            history,
        };
        app.seed(RoleScope::global(), "mod", Role::Moderator, None).await;
        app
    }

    async fn seed(&self, scope: RoleScope, user: &str, role: Role, parent: Option<&str>) {
        self.roles
            .inner()
            .upsert_user_role(
                RoleAssignment::new(scope, user, role, UserType::Individual, "seed")
                    .with_parent(parent.map(str::to_string)),
            )
            .await
            .unwrap();
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn dashboard(id: &str) -> RoleScope {
    RoleScope::resource(ResourceRef::new(id, ResourceType::Dashboard))
}

fn widget(id: &str) -> RoleScope {
    RoleScope::resource(ResourceRef::new(id, ResourceType::DashboardWidget))
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized_before_any_lookup() {
    let app = TestApp::new().await;
    app.roles.reset_stats().await;

    let (status, body) = app
        .send(Method::GET, "/systems/acme/owner", None, None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert_eq!(app.roles.stats().await.total_calls(), 0);
}

#[tokio::test]
async fn test_moderator_creates_system_owner() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/systems/acme/owner",
            Some("mod"),
            Some(json!({"user_id": "alice"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["role"], "owner");

    let (status, body) = app
        .send(Method::GET, "/systems/acme/owner", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "alice");
}

#[tokio::test]
async fn test_non_moderator_cannot_create_system_owner() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/systems/acme/owner",
            Some("mallory"),
            Some(json!({"user_id": "mallory"})),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
    assert!(app.history.is_empty().await);
}

#[tokio::test]
async fn test_second_system_owner_conflicts() {
    let app = TestApp::new().await;
    let create = |user: &'static str| json!({ "user_id": user });

    let (status, _) = app
        .send(Method::POST, "/systems/acme/owner", Some("mod"), Some(create("alice")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Method::POST, "/systems/acme/owner", Some("mod"), Some(create("bob")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 409);
}

#[tokio::test]
async fn test_repeated_system_owner_create_conflicts() {
    let app = TestApp::new().await;
    let body = json!({ "user_id": "alice" });

    let (status, _) = app
        .send(Method::POST, "/systems/acme/owner", Some("mod"), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Method::POST, "/systems/acme/owner", Some("mod"), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 409);
}

#[tokio::test]
async fn test_system_member_lifecycle() {
    let app = TestApp::new().await;
    app.seed(RoleScope::system("acme"), "alice", Role::Owner, None).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/systems/acme/roles",
            Some("alice"),
            Some(json!({"user_id": "bob", "role": "editor"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "editor");

    let (status, body) = app
        .send(Method::GET, "/systems/acme/roles?roles=editor", Some("bob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Editors cannot add members.
    let (status, _) = app
        .send(
            Method::POST,
            "/systems/acme/roles",
            Some("bob"),
            Some(json!({"user_id": "carol", "role": "viewer"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, "/systems/acme/roles/bob", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::DELETE, "/systems/acme/roles/bob", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(Method::GET, "/systems/acme/history", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["records"][0]["operation"], "delete_system_user_role");
}

#[tokio::test]
async fn test_owner_cannot_be_assigned_generically() {
    let app = TestApp::new().await;
    app.seed(RoleScope::system("acme"), "alice", Role::Owner, None).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/systems/acme/roles",
            Some("alice"),
            Some(json!({"user_id": "bob", "role": "owner"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_role_is_bad_request() {
    let app = TestApp::new().await;
    app.seed(RoleScope::system("acme"), "alice", Role::Owner, None).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/systems/acme/roles",
            Some("alice"),
            Some(json!({"user_id": "bob", "role": "superuser"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_batch_assign_reports_per_target_outcome() {
    let app = TestApp::new().await;
    app.seed(RoleScope::system("acme"), "alice", Role::Owner, None).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/systems/acme/roles/batch",
            Some("alice"),
            Some(json!({"user_ids": ["bob", "alice", "carol"], "role": "viewer"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success_count"], 2);
    assert_eq!(body["failed_count"], 1);
    assert_eq!(body["failed_entries"][0]["user_id"], "alice");
}

#[tokio::test]
async fn test_transfer_system_owner_demotes_previous() {
    let app = TestApp::new().await;
    app.seed(RoleScope::system("acme"), "alice", Role::Owner, None).await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/systems/acme/owner",
            Some("alice"),
            Some(json!({"user_id": "bob"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "bob");

    let (_, body) = app
        .send(Method::GET, "/me/roles?namespace=acme", Some("alice"), None)
        .await;
    assert_eq!(body[0]["role"], "admin");
}

#[tokio::test]
async fn test_missing_parent_never_reaches_repository() {
    let app = TestApp::new().await;
    app.roles.reset_stats().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/resources/roles",
            Some("alice"),
            Some(json!({
                "resource_id": "w1",
                "resource_type": "dashboard_widget",
                "user_id": "bob",
                "role": "viewer"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("parent_resource_id"));
    assert_eq!(app.roles.stats().await.total_calls(), 0);
}

#[tokio::test]
async fn test_unmatched_conditions_name_no_matching_configuration() {
    let app = TestApp::new().await;
    app.roles.reset_stats().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/resources/roles",
            Some("alice"),
            Some(json!({
                "resource_id": "w1",
                "resource_type": "dashboard_widget",
                "parent_resource_id": "d1",
                "user_id": "bob",
                "role": "editor"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no matching configuration"));
    assert_eq!(app.roles.stats().await.total_calls(), 0);
}

#[tokio::test]
async fn test_widget_viewer_is_governed_by_parent_dashboard() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    let body = json!({
        "resource_id": "w1",
        "resource_type": "dashboard_widget",
        "parent_resource_id": "d1",
        "user_id": "bob",
        "role": "viewer"
    });

    let (status, assigned) = app
        .send(Method::POST, "/resources/roles", Some("alice"), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["parent_resource_id"], "d1");

    // A viewer of the widget holds nothing on the dashboard.
    let (status, _) = app
        .send(Method::POST, "/resources/roles", Some("bob"), Some(body))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_resource_owner_claim_is_first_come() {
    let app = TestApp::new().await;
    let claim = json!({"resource_id": "d1", "resource_type": "dashboard"});

    let (status, body) = app
        .send(Method::POST, "/resources/owner", Some("alice"), Some(claim.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], "alice");

    let (status, _) = app
        .send(Method::POST, "/resources/owner", Some("bob"), Some(claim))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_nested_owner_claim_needs_parent_permission() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    let claim = json!({
        "resource_id": "w1",
        "resource_type": "dashboard_widget",
        "parent_resource_id": "d1"
    });

    let (status, _) = app
        .send(Method::POST, "/resources/owner", Some("mallory"), Some(claim.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::POST, "/resources/owner", Some("alice"), Some(claim))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_accessible_children_follow_inheritance_and_whitelist() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    app.seed(widget("w1"), "bob", Role::Viewer, Some("d1")).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/resources/accessible",
            Some("alice"),
            Some(json!({
                "resource_type": "dashboard_widget",
                "parent_resource_id": "d1",
                "resource_ids": ["w2", "w1", "w3"]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resource_ids"], json!(["w2", "w3"]));
}

#[tokio::test]
async fn test_whitelisted_child_is_accessible_without_parent_role() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    app.seed(widget("w1"), "bob", Role::Viewer, Some("d1")).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/resources/accessible",
            Some("bob"),
            Some(json!({
                "resource_type": "dashboard_widget",
                "parent_resource_id": "d1",
                "resource_ids": ["w1", "w2"]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resource_ids"], json!(["w1"]));
}

#[tokio::test]
async fn test_new_widget_inherits_dashboard_viewers() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    app.seed(dashboard("d1"), "bob", Role::Viewer, None).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/resources/owner",
            Some("alice"),
            Some(json!({
                "resource_id": "w1",
                "resource_type": "dashboard_widget",
                "parent_resource_id": "d1"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let check = json!({
        "permission": "resource.dashboard_widget.read",
        "resource_id": "w1",
        "resource_type": "dashboard_widget",
        "parent_resource_id": "d1"
    });
    let (status, body) = app
        .send(Method::POST, "/permissions/check", Some("bob"), Some(check.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    // The creator keeps access once a whitelist exists.
    app.seed(widget("w1"), "carol", Role::Viewer, Some("d1")).await;
    let (_, body) = app
        .send(Method::POST, "/permissions/check", Some("alice"), Some(check.clone()))
        .await;
    assert_eq!(body["allowed"], true);
    let (_, body) = app
        .send(Method::POST, "/permissions/check", Some("bob"), Some(check))
        .await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_missing_operation_params_never_reach_repository() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    app.roles.reset_stats().await;

    let cases = [
        (
            Method::DELETE,
            "/resources/roles?resource_id=d1&resource_type=dashboard",
            None,
            "user_id",
        ),
        (
            Method::POST,
            "/resources/roles",
            Some(json!({"resource_id": "d1", "resource_type": "dashboard", "user_id": "bob"})),
            "role",
        ),
        (
            Method::POST,
            "/resources/roles/batch",
            Some(json!({
                "resource_id": "d1",
                "resource_type": "dashboard",
                "role": "editor",
                "user_ids": []
            })),
            "user_ids",
        ),
        (
            Method::POST,
            "/systems/acme/roles",
            Some(json!({"role": "editor"})),
            "user_id",
        ),
        (Method::PUT, "/systems/acme/owner", Some(json!({})), "user_id"),
    ];

    for (method, uri, body, missing) in cases {
        let (status, response) = app.send(method, uri, Some("alice"), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(
            response["error"].as_str().unwrap().contains(missing),
            "{}: {}",
            uri,
            response
        );
    }
    assert_eq!(app.roles.stats().await.total_calls(), 0);
}

#[tokio::test]
async fn test_delete_resource_cascades_to_children() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;
    app.seed(dashboard("d1"), "bob", Role::Editor, None).await;
    app.seed(widget("w1"), "carol", Role::Viewer, Some("d1")).await;

    let (status, body) = app
        .send(
            Method::DELETE,
            "/resources?resource_id=d1&resource_type=dashboard",
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 3);

    let (_, body) = app.send(Method::GET, "/me/roles", Some("carol"), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_resource_history_includes_descendants() {
    let app = TestApp::new().await;
    app.seed(dashboard("d1"), "alice", Role::Owner, None).await;

    for (resource_type, id, parent) in [("dashboard", "d1", None), ("dashboard_widget", "w1", Some("d1"))] {
        let mut body = json!({
            "resource_id": id,
            "resource_type": resource_type,
            "user_id": "bob",
            "role": "viewer"
        });
        if let Some(parent) = parent {
            body["parent_resource_id"] = json!(parent);
        }
        let (status, _) = app
            .send(Method::POST, "/resources/roles", Some("alice"), Some(body))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .send(
            Method::GET,
            "/resources/history?resource_id=d1&resource_type=dashboard&descendant_ids=w1&page_size=10",
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = app
        .send(
            Method::GET,
            "/resources/history?resource_id=d1&resource_type=dashboard",
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_check_permission_is_a_pure_predicate() {
    let app = TestApp::new().await;
    app.seed(RoleScope::system("acme"), "alice", Role::Admin, None).await;

    let check = |permission: &str| json!({ "permission": permission, "namespace": "acme" });

    let (status, body) = app
        .send(Method::POST, "/permissions/check", Some("alice"), Some(check("system.add_member")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (status, body) = app
        .send(Method::POST, "/permissions/check", Some("alice"), Some(check("system.transfer_owner")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
    assert!(app.history.is_empty().await);
}

#[tokio::test]
async fn test_my_roles_rejects_conflicting_filters() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(
            Method::GET,
            "/me/roles?namespace=acme&resource_id=d1&resource_type=dashboard",
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
