use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    LatencyUnit,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod config;
pub mod error;
pub mod routes;

pub use schema;

pub fn app(app_state: config::AppState) -> Router {
    let request_timeout_in_ms = app_state.env_vars.request_timeout_in_ms;
    let request_body_size_limit = app_state.env_vars.request_body_size_limit;

    Router::new()
        .route("/", get(routes::get_root))
        .route("/test", get(routes::get_test))
        .route(
            "/admin/tests",
            get(routes::get_admin_tests).post(routes::post_admin_tests),
        )
        .route("/admin/tests/questions", post(routes::post_admin_questions))
        .route("/admin/tests/assign", post(routes::post_admin_assign))
        .route("/student/join", post(routes::post_student_join))
        .route(
            "/student/questions/{test_code}",
            get(routes::get_student_questions),
        )
        .route("/student/submit", post(routes::post_student_submit))
        .route("/alerts", post(routes::post_alert))
        .route("/alerts/{test_code}", get(routes::get_alerts))
        .layer(TimeoutLayer::new(Duration::from_millis(
            request_timeout_in_ms,
        )))
        .layer(RequestBodyLimitLayer::new(request_body_size_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        .with_state(app_state)
}
