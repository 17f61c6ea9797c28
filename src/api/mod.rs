use axum::{Router, http::HeaderValue, routing::post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::AccountService;

mod error;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

pub struct AppState {
    pub store: Store,

    pub accounts: AccountService,
}

pub async fn create_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    store.initialize_secrets(&config.auth).await?;

    let accounts = AccountService::new(store.clone(), config.security.clone());

    Ok(Arc::new(AppState { store, accounts }))
}

pub fn router(state: Arc<AppState>, config: &Config) -> Router {
    let cors_layer = if config
        .server
        .cors_allowed_origins
        .contains(&"*".to_string())
    {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_allowed_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route(
            "/users",
            post(users::register)
                .get(users::list_users)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/login", post(users::login))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
