use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{auth, broadcast_logs, contacts, messenger_accounts, plans, templates, users};

/// Every route, mounted under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/subscription-plans", get(plans::list_plans))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/messenger-accounts",
            get(messenger_accounts::list_accounts).post(messenger_accounts::create_account),
        )
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/broadcast-logs", get(broadcast_logs::list_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Layers run bottom-up: require_auth first, then require_admin.
    let admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{user_id}/subscription", put(users::update_subscription))
        .route("/users/{user_id}/unlimited", put(users::update_unlimited))
        .route("/users/{user_id}/revoke-tokens", post(users::revoke_tokens))
        .route("/subscription-plans/{plan_id}", put(plans::update_plan_price))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state);

    Router::new().nest("/api", api)
}

async fn health() -> &'static str {
    "OK"
}
