use std::io;

use async_stream::stream;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri, header::HOST},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::{
    application::{
        conversion::{ConversionOutcome, ConvertedDocument},
        error::HttpError,
    },
    domain::conversion::DocumentFormat,
};

use super::{
    HttpState,
    headers::{apply_attachment, apply_content_length, apply_document_headers},
};

const STREAM_CHUNK_BYTES: usize = 64 * 1024;
const DEFAULT_HOSTNAME: &str = "localhost";

/// `GET /{*path}`: conversion requests by suffix, everything else to the fallback.
pub(super) async fn dispatch(
    State(state): State<HttpState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let Some(format) = DocumentFormat::detect(&path) else {
        return state.fallback.respond(&uri);
    };

    let hostname = request_hostname(&headers, &uri);
    match state.conversion.convert(&hostname, format, &path).await {
        Ok(ConversionOutcome::Converted(document)) => document_response(document),
        Ok(ConversionOutcome::Unavailable(_) | ConversionOutcome::NotFound(_)) => {
            state.fallback.respond(&uri)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn fallback(State(state): State<HttpState>, uri: Uri) -> Response {
    state.fallback.respond(&uri)
}

fn document_response(document: ConvertedDocument) -> Response {
    let format = document.format;
    let len = document.len;
    let filename = document.filename.clone();

    let mut response = Response::new(document_body(document));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    apply_document_headers(headers, format);
    apply_content_length(headers, len);
    apply_attachment(headers, &filename);

    response
}

/// Stream the converter output; the scratch file is deleted once the body
/// completes or is dropped by a disconnecting client.
fn document_body(document: ConvertedDocument) -> Body {
    let ConvertedDocument {
        mut file, artifact, ..
    } = document;

    let chunks = stream! {
        let _artifact = artifact;
        let mut buffer = vec![0u8; STREAM_CHUNK_BYTES];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => {
                    yield Ok::<Bytes, io::Error>(Bytes::copy_from_slice(&buffer[..read]));
                }
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    };

    Body::from_stream(chunks)
}

fn request_hostname(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
        .map(strip_port)
        .filter(|host| !host.is_empty())
        .unwrap_or(DEFAULT_HOSTNAME)
        .to_ascii_lowercase()
}

fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}
