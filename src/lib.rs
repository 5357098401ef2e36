use crate::catalog::Catalog;
use crate::cli::{Args, StoreKind};
use crate::engine::LearningEngine;
use crate::store::{MemoryStore, PgStore, ProgressStore};
use anyhow::Context;
use axum::Router;
use axum::routing::{get, post, put};
use axum_keycloak_auth::PassthroughMode;
use axum_keycloak_auth::instance::{KeycloakAuthInstance, KeycloakConfig};
use axum_keycloak_auth::layer::KeycloakAuthLayer;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod catalog;
pub mod cli;
pub mod engine;
pub mod errors;
pub mod model;
pub mod payloads;
pub mod response;
pub mod schema;
pub mod store;

mod api;

pub fn init_router(args: &Args) -> anyhow::Result<Router> {
    info!("Loading course catalog from {}...", args.catalog_path.display());
    let catalog =
        Catalog::from_path(&args.catalog_path).context("Failed to load course catalog")?;

    let store = init_store(args).context("Failed to initialize progress store")?;

    info!("Initializing Keycloak authentication layer...");
    let keycloak_layer =
        init_protection_layer(args).context("Failed to initialize Keycloak layer")?;

    info!("Initializing router...");
    let engine = LearningEngine::new(store, Arc::new(catalog));
    Ok(init_router_internal(engine, keycloak_layer))
}

/// Router without authentication, for tests and local tooling.
pub fn init_test_router(engine: LearningEngine) -> Router {
    Router::new()
        .nest("/progress", progress_routes())
        .nest("/rewards", rewards_routes())
        .route("/leaderboard", get(api::rewards::get_leaderboard))
        .with_state(engine)
}

fn init_router_internal(engine: LearningEngine, keycloak_layer: KeycloakAuthLayer<String>) -> Router {
    let progress_api = progress_routes().layer(keycloak_layer.clone());
    let rewards_api = rewards_routes().layer(keycloak_layer.clone());

    Router::new()
        .nest("/progress", progress_api)
        .nest("/rewards", rewards_api)
        // public routes go here
        .route("/leaderboard", get(api::rewards::get_leaderboard))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

fn init_store(args: &Args) -> anyhow::Result<Arc<dyn ProgressStore>> {
    match args.store {
        StoreKind::Memory => {
            info!("Using in-memory progress store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Postgres => {
            let conn_str = args
                .connection_str
                .as_deref()
                .context("A connection string is required for the postgres store")?;
            let store = PgStore::connect(conn_str, args.db_pool_max_size)?;
            Ok(Arc::new(store))
        }
    }
}

fn init_protection_layer(args: &Args) -> anyhow::Result<KeycloakAuthLayer<String>> {
    let config = KeycloakConfig::builder()
        .server(args.keycloak_server_url.clone())
        .realm(args.keycloak_realm.clone())
        .build();

    let instance = KeycloakAuthInstance::new(config);

    let layer = KeycloakAuthLayer::builder()
        .instance(instance)
        .passthrough_mode(PassthroughMode::Block)
        .persist_raw_claims(false)
        .expected_audiences(vec![args.keycloak_audiences.clone()])
        .build();

    Ok(layer)
}

fn progress_routes() -> Router<LearningEngine> {
    Router::new()
        .route("/start", post(api::progress::start_course))
        .route("/watch-time", put(api::progress::record_watch_time))
        .route("/video-complete", put(api::progress::complete_video))
        .route("/my-progress", get(api::progress::get_my_progress))
        .route(
            "/course/{course_id}",
            get(api::progress::get_course_progress),
        )
        .route("/quiz", get(api::progress::get_quiz))
        .route("/submit-quiz", post(api::progress::submit_quiz))
}

fn rewards_routes() -> Router<LearningEngine> {
    Router::new()
        .route("/stats", get(api::rewards::get_stats))
        .route("/my-badges", get(api::rewards::get_my_badges))
        .route("/badges", get(api::rewards::get_all_badges))
}
