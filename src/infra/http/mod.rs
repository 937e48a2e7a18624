mod convert;
mod fallback;
mod headers;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
};

pub use fallback::{FallbackResponder, NotFoundPage};

use crate::application::conversion::ConversionService;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub conversion: Arc<ConversionService>,
    pub fallback: Arc<dyn FallbackResponder>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .route("/{*path}", get(convert::dispatch))
        .fallback(convert::fallback)
        .with_state(state)
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
