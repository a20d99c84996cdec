use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE, HOST};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, post}, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::negotiate_apology;
use crate::handlers::accounts::{login, login_page, logout, signup, signup_page};
use crate::handlers::enquiries::{contact, contact_form, schedule_call, schedule_call_form};
use crate::handlers::listings::{register, register_page};
use crate::handlers::pages::{about, banquet_detail, banquet_index, fallback, health, landing};
use crate::session::session_layer;
use crate::state::AppState;

/// Reject requests whose `Host` header is not in the allow-list.
async fn check_host(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()));

    match host {
        Some(host) if state.config.host_allowed(&host) => next.run(req).await,
        other => {
            warn!("Rejected request for disallowed host {:?}", other);
            (StatusCode::BAD_REQUEST, "Bad Request (400)").into_response()
        }
    }
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static("x-requested-with")])
        .allow_credentials(true)
}

pub fn app_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/", get(landing))
        .route("/about", get(about))
        .route("/banquet", get(banquet_index))
        .route("/banquet/:id", get(banquet_detail))
        .route("/signup", get(signup_page).post(signup))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/register-banquet", get(register_page).post(register))
        .route("/schedule-call", get(schedule_call_form).post(schedule_call))
        .route("/contact", get(contact_form).post(contact))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(&config.static_root))
        .nest_service("/media", ServeDir::new(&config.media_root))
        .fallback(fallback)
        .layer(middleware::from_fn(negotiate_apology))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(DefaultBodyLimit::max(config.max_request_bytes()))
        .layer(cors_layer(&state))
        .layer(middleware::from_fn_with_state(state.clone(), check_host))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
