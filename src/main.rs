//! Incidence Tracker Backend
//!
//! Classrooms, devices and incidence reports over a SQLite document store,
//! with filesystem blob storage for images.

mod api;
mod auth;
mod blobs;
mod config;
mod errors;
mod forms;
mod guards;
mod models;
mod session;
mod store;
mod views;

use std::sync::Arc;

use axum::{
    middleware::{self, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::AuthProvider;
use blobs::BlobStore;
use config::Config;
use errors::{ApiError, AppError};
use forms::Forms;
use session::Session;
use store::DocumentStore;
use views::Views;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub blobs: BlobStore,
    pub auth: AuthProvider,
    pub session: Session,
    pub views: Arc<Views>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn forms(&self) -> Forms {
        Forms::new(
            self.store.clone(),
            self.blobs.clone(),
            self.auth.clone(),
            self.session.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Incidence Tracker Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Blob root: {:?}", config.blob_root);
    tracing::info!("Session path: {:?}", config.session_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (INCIDENCIAS_API_PSK). Authentication is disabled!");
    }

    let pool = store::init_database(&config.db_path).await?;
    let store = DocumentStore::new(pool.clone());
    let auth = AuthProvider::new(pool);
    let blobs = BlobStore::open(&config.blob_root, &config.public_base_url, &config.bucket).await?;
    let session = Session::open(&config.session_path).await?;
    let views = Arc::new(Views::new(
        store.clone(),
        config.load_step,
        config.search_debounce,
    ));

    let state = AppState {
        store,
        blobs,
        auth,
        session,
        views,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    // Sign-in pages, only while signed out
    let no_auth_routes = Router::new()
        .route("/auth", get(api::auth_page).post(api::sign_in))
        .route("/sign-up", get(api::sign_up_page).post(api::sign_up))
        .route(
            "/forgot-password",
            get(api::forgot_password_page).post(api::forgot_password),
        )
        .route_layer(from_fn_with_state(state.clone(), guards::require_no_auth));

    let tic_routes = Router::new()
        .route("/main/incidencias", get(api::incidences))
        .route("/main/incidencias/more", post(api::incidences_more))
        .route("/main/incidencias/search", post(api::search_incidences))
        .route(
            "/main/incidencias/detalles/{id}",
            get(api::manage_details)
                .put(api::manage_incidence)
                .delete(api::delete_incidence),
        )
        .route_layer(from_fn_with_state(state.clone(), guards::require_tic_role));

    let admin_routes = Router::new()
        .route("/main/aulas", get(api::classrooms).post(api::add_classroom))
        .route("/main/aulas/more", post(api::classrooms_more))
        .route("/main/aulas/search", post(api::search_classrooms))
        .route(
            "/main/aulas/{id}",
            put(api::update_classroom).delete(api::delete_classroom),
        )
        .route("/main/inventario", get(api::inventory).post(api::add_device))
        .route("/main/inventario/more", post(api::inventory_more))
        .route("/main/inventario/search", post(api::search_devices))
        .route(
            "/main/inventario/detalles/{classroom_id}/{device_id}",
            get(api::device_details)
                .put(api::update_device)
                .delete(api::delete_device),
        )
        .route(
            "/main/create-privileged-user",
            post(api::create_privileged_user),
        )
        .route_layer(from_fn_with_state(state.clone(), guards::require_admin_role));

    let main_routes = Router::new()
        .route("/main", get(api::shell))
        .route("/main/sign-out", post(api::sign_out))
        .route(
            "/main/mis-incidencias",
            get(api::my_incidences).post(api::add_incidence),
        )
        .route("/main/mis-incidencias/more", post(api::my_incidences_more))
        .route("/main/mis-incidencias/search", post(api::search_my_incidences))
        .route(
            "/main/mis-incidencias/detalles/{id}",
            get(api::my_incidence_details)
                .put(api::update_incidence)
                .delete(api::delete_own_incidence),
        )
        .route("/main/opciones/aulas", get(api::classroom_options))
        .route(
            "/main/opciones/aulas/{classroom_id}/equipos",
            get(api::device_options),
        )
        .merge(tic_routes)
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), guards::require_auth));

    let app_routes = Router::new()
        .route("/", get(root_redirect))
        .merge(no_auth_routes)
        .merge(main_routes)
        .route(
            "/storage/v1/object/public/{bucket}/{*path}",
            get(api::public_object),
        )
        .fallback(not_found)
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(app_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// GET / - Straight to the sign-in page.
async fn root_redirect() -> axum::response::Redirect {
    session::url_tree(guards::AUTH_ROUTE)
}

/// Unknown routes.
async fn not_found() -> ApiError {
    AppError::NotFound("Page not found".to_string()).into()
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
