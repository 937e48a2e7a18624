use axum::http::{
    HeaderMap, HeaderValue,
    header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, VARY},
};

use crate::domain::conversion::DocumentFormat;

/// Seconds a client may cache dynamically generated content.
pub const DYNAMIC_CONTENT_CACHE_SECONDS: u32 = 60;

/// Headers shared by every converted document response.
pub fn apply_document_headers(headers: &mut HeaderMap, format: DocumentFormat) {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    if let Ok(value) =
        HeaderValue::from_str(&format!("max-age={DYNAMIC_CONTENT_CACHE_SECONDS}"))
    {
        headers.insert(CACHE_CONTROL, value);
    }
    headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
}

pub fn apply_content_length(headers: &mut HeaderMap, len: u64) {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
}

/// `attachment; filename="<name>"`. Names come from validated route
/// components, so they carry no quotes or control characters.
pub fn apply_attachment(headers: &mut HeaderMap, filename: &str) {
    let safe_name = filename.replace('"', "'");
    let value = format!("attachment; filename=\"{safe_name}\"");
    if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
}
