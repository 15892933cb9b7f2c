// HTTP surface: route table and the per-resource handlers.
// Reads are public; handlers taking an `AuthUser` require a bearer token.

pub mod auth;
pub mod bootcamps;
pub mod children;
pub mod health;
pub mod users;

use axum::{
    extract::{Path, Query, State},
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::middleware::JsonDocument;
use crate::services::{ChildKind, COURSES, REVIEWS};
use crate::state::AppState;

type Params = Query<Vec<(String, String)>>;

/// Build the application router with its global middleware
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/health", get(health::health))
        .merge(auth_routes())
        .merge(bootcamp_routes())
        .merge(child_routes(&COURSES, "courses"))
        .merge(child_routes(&REVIEWS, "reviews"))
        .merge(user_routes())
        .with_state(state);

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/updatedetails", put(auth::update_details))
        .route("/api/v1/auth/updatepassword", put(auth::update_password))
}

fn bootcamp_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/bootcamps", get(bootcamps::list).post(bootcamps::create))
        .route(
            "/api/v1/bootcamps/:id",
            get(bootcamps::show)
                .put(bootcamps::update)
                .delete(bootcamps::delete),
        )
}

/// Routes for a collection nested under bootcamps
fn child_routes(kind: &'static ChildKind, plural: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/api/v1/{}", plural),
            get(move |state: State<AppState>, params: Params| children::list(kind, state, params)),
        )
        .route(
            &format!("/api/v1/{}/:id", plural),
            get(move |state: State<AppState>, id: Path<String>| children::show(kind, state, id))
                .put(
                    move |state: State<AppState>, user: AuthUser, id: Path<String>, body: JsonDocument| {
                        children::update(kind, state, user, id, body)
                    },
                )
                .delete(move |state: State<AppState>, user: AuthUser, id: Path<String>| {
                    children::delete(kind, state, user, id)
                }),
        )
        .route(
            &format!("/api/v1/bootcamps/:id/{}", plural),
            get(move |state: State<AppState>, id: Path<String>, params: Params| {
                children::list_for_bootcamp(kind, state, id, params)
            })
            .post(
                move |state: State<AppState>, user: AuthUser, id: Path<String>, body: JsonDocument| {
                    children::create(kind, state, user, id, body)
                },
            )
            .delete(move |state: State<AppState>, user: AuthUser, id: Path<String>| {
                children::delete_for_bootcamp(kind, state, user, id)
            }),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", get(users::list).post(users::create))
        .route(
            "/api/v1/users/:id",
            get(users::show).put(users::update).delete(users::delete),
        )
}
