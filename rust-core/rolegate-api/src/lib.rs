// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rolegate API
//!
//! HTTP surface for the authorization backend. Every route except
//! `/health` passes through the request-matching middleware, which picks the
//! route's policy candidate, validates parameters and enforces the
//! permission before the handler runs.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod params;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use rolegate_authz::{HistoryRecorder, PermissionService};
use rolegate_model::{Role, RoleAssignment, RoleScope, UserType};
use rolegate_policy::{PolicyEngine, PolicyError};
use rolegate_store::{
    InMemoryHistoryRepository, InMemoryRoleRepository, RoleRepository, StoreError,
};

pub use config::ApiConfig;
pub use error::{ApiError, ErrorResponse};
pub use middleware::RequestContext;
pub use routes::{RouteConfig, RouteDescriptor, RouteTable};

/// Startup failures.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("policy load failed: {0}")]
    Policy(#[from] PolicyError),

    #[error("bootstrap failed: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub service: PermissionService,
    pub routes: Arc<RouteTable>,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the route table from the service's engine.
    pub fn new(config: ApiConfig, service: PermissionService) -> Result<Self, PolicyError> {
        let routes = RouteTable::standard(service.engine())?;
        Ok(Self {
            service,
            routes: Arc::new(routes),
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }

    /// State over fresh in-memory repositories and the embedded policies,
    /// with `config.bootstrap_moderators` seeded as global moderators.
    pub async fn in_memory(config: ApiConfig) -> Result<Self, ServeError> {
        let roles = Arc::new(InMemoryRoleRepository::new());
        seed_moderators(roles.as_ref(), &config.bootstrap_moderators).await?;

        let history = HistoryRecorder::new(Arc::new(InMemoryHistoryRepository::new()))
            .with_max_page_size(config.max_history_page_size);
        let service = PermissionService::new(roles, Arc::new(PolicyEngine::embedded()?), history);
        Ok(Self::new(config, service)?)
    }
}

async fn seed_moderators(roles: &dyn RoleRepository, users: &[String]) -> Result<(), StoreError> {
    for user in users {
        let grant = RoleAssignment::new(
            RoleScope::global(),
            user.as_str(),
            Role::Moderator,
            UserType::Individual,
            "bootstrap",
        );
        roles.upsert_user_role(grant).await?;
        info!(user = %user, "Seeded bootstrap moderator");
    }
    Ok(())
}

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    use handlers as h;

    let gated = Router::new()
        // Systems
        .route(
            "/systems/{namespace}/owner",
            post(h::create_system_owner)
                .get(h::get_system_owner)
                .put(h::transfer_system_owner),
        )
        .route(
            "/systems/{namespace}/roles",
            get(h::list_system_user_roles).post(h::assign_system_user_role),
        )
        .route(
            "/systems/{namespace}/roles/batch",
            post(h::batch_assign_system_user_roles),
        )
        .route(
            "/systems/{namespace}/roles/{user_id}",
            delete(h::delete_system_user_role),
        )
        .route("/systems/{namespace}/history", get(h::list_system_history))
        // Resources
        .route("/resources", delete(h::delete_resource))
        .route(
            "/resources/owner",
            post(h::create_resource_owner).put(h::transfer_resource_owner),
        )
        .route(
            "/resources/roles",
            get(h::list_resource_user_roles)
                .post(h::assign_resource_user_role)
                .delete(h::delete_resource_user_role),
        )
        .route(
            "/resources/roles/batch",
            post(h::batch_assign_resource_user_roles),
        )
        .route("/resources/history", get(h::list_resource_history))
        .route("/resources/accessible", post(h::list_accessible_resources))
        // Caller-centric
        .route("/me/roles", get(h::list_my_roles))
        .route("/permissions/check", post(h::check_permission))
        .route_layer(from_fn_with_state(state.clone(), middleware::authorize_request));

    Router::new()
        .route("/health", get(h::health_handler))
        .merge(gated)
        .with_state(state)
}

/// Start the API server
pub async fn serve(config: ApiConfig) -> Result<(), ServeError> {
    let addr = config.bind_addr();
    let state = AppState::in_memory(config).await?;
    let app = build_router(state);

    info!("Starting Rolegate API server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
