// client-gateway/src/middleware/static_assets.rs
//! Serves archive entries with conditional-request handling.
//!
//! Outermost middleware in the chain: a request whose path matches an
//! archive entry is answered here and never reaches the session layer,
//! mirroring the middleware cascade order. Everything else is forwarded
//! untouched.

use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::archive::{entry_path, minute_floor_millis, ClientArchive};
use crate::transform::transform;

const IMMUTABLE_CACHE_CONTROL: &str = "public,max-age=31536000,immutable";

/// Request-extension marker: no bearer credentials on this response.
///
/// Host layers that attach auth tokens must skip requests carrying this
/// marker; static-asset responses never need them.
#[derive(Clone, Copy, Debug)]
pub struct SuppressTokens;

/// Whether token attachment was suppressed for this request.
pub fn tokens_suppressed(req: &HttpRequest) -> bool {
    req.extensions().get::<SuppressTokens>().is_some()
}

pub struct StaticAssets {
    archive: Option<Arc<ClientArchive>>,
}

impl StaticAssets {
    /// `None` means the archive failed to load; every request is forwarded.
    pub fn new(archive: Option<Arc<ClientArchive>>) -> Self {
        Self { archive }
    }
}

impl<S, B> Transform<S, ServiceRequest> for StaticAssets
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = StaticAssetsMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(StaticAssetsMiddleware {
            service,
            archive: self.archive.clone(),
        }))
    }
}

pub struct StaticAssetsMiddleware<S> {
    service: S,
    archive: Option<Arc<ClientArchive>>,
}

impl<S, B> Service<ServiceRequest> for StaticAssetsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(archive) = self.archive.as_deref() {
            if let Some(response) = serve_archive(archive, &req) {
                let (request, _payload) = req.into_parts();
                request.extensions_mut().insert(SuppressTokens);
                let res = ServiceResponse::new(request, response);
                return Box::pin(ready(Ok(res.map_into_right_body())));
            }
        }
        let fut = self.service.call(req);
        Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
    }
}

/// Build the response for an archive-backed path, or `None` to fall through
/// to the next handler (no matching entry, or the entry is unreadable).
fn serve_archive(archive: &ClientArchive, req: &ServiceRequest) -> Option<HttpResponse> {
    let entry = archive.lookup(req.path())?;
    let last_modified = archive.last_modified();

    if is_fresh(req.headers().get(header::IF_MODIFIED_SINCE), last_modified) {
        return Some(HttpResponse::NotModified().finish());
    }

    let raw = match archive.read(entry) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(path = req.path(), error = %e, "archive entry unreadable");
            return None;
        }
    };
    let path = entry_path(req.path());
    let body = transform(path, raw);

    let mut builder = HttpResponse::Ok();
    builder.insert_header((header::CONTENT_TYPE, content_type_for(path)));
    builder.insert_header((header::LAST_MODIFIED, http_date(last_modified)));
    // Explicitly-versioned resources can be cached forever.
    if has_bust_param(req.query_string()) {
        builder.insert_header((header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL));
    }
    Some(builder.body(body))
}

/// A conditional request is fresh when its timestamp, floored to the minute,
/// is at or past the archive timestamp. Malformed headers are never fresh.
fn is_fresh(header: Option<&header::HeaderValue>, last_modified: DateTime<Utc>) -> bool {
    let Some(value) = header.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    match DateTime::parse_from_rfc2822(value) {
        Ok(parsed) => {
            minute_floor_millis(parsed.timestamp_millis()) >= last_modified.timestamp_millis()
        }
        Err(_) => false,
    }
}

fn http_date(stamp: DateTime<Utc>) -> String {
    stamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn has_bust_param(query: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == "bust")
}

fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("css") => "text/css",
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("map") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ttf") => "font/ttf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "text/html",
    }
}
