use axum::{http::Uri, response::Response};

use crate::presentation::views::render_not_found_response;

/// Answers requests that have no conversion result to offer.
pub trait FallbackResponder: Send + Sync {
    fn respond(&self, uri: &Uri) -> Response;
}

/// Renders the standard HTML 404 page.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundPage;

impl FallbackResponder for NotFoundPage {
    fn respond(&self, uri: &Uri) -> Response {
        render_not_found_response(uri.path())
    }
}
