//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Order of precedence:
//! `OPTIONS` preflight, `/debug`, static assets (GET/HEAD), then the
//! dynamic routes. Anything else is a plain-text 404.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::{header, Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::{debug, gateway, static_files};
use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
///
/// Buffers the body (bounded by `http.max_body_size`), dispatches, and
/// writes the access log line.
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let mut entry = access_entry(&req, peer_addr);
    let max_body_size = state.config.http.max_body_size;

    let (response, route) = if exceeds_limit(&req, max_body_size) {
        (http::build_413_response(), "too_large")
    } else {
        let (parts, body) = req.into_parts();
        let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
        match Limited::new(body, limit).collect().await {
            Ok(collected) => {
                let req = Request::from_parts(parts, collected.to_bytes());
                dispatch(req, &state).await
            }
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                logger::log_warning(&format!(
                    "Request body exceeded {max_body_size} bytes, rejected"
                ));
                (http::build_413_response(), "too_large")
            }
            Err(e) => {
                logger::log_warning(&format!("Failed to read request body: {e}"));
                (
                    http::build_text_response(StatusCode::BAD_REQUEST, "400 Bad Request"),
                    "bad_request",
                )
            }
        }
    };

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response_len(&response);
        entry.route = route;
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route a buffered request; returns the response and the route label for logging
pub async fn dispatch(req: Request<Bytes>, state: &AppState) -> (Response<Full<Bytes>>, &'static str) {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::OPTIONS {
        return (http::build_preflight_response(), "preflight");
    }

    if method == Method::GET && path == "/debug" && state.config.http.enable_debug {
        return (
            debug::handle_debug(state, &method, req.uri(), req.headers()),
            "debug",
        );
    }

    let is_head = method == Method::HEAD;
    if method == Method::GET || is_head {
        if let Some(assets) = &state.assets {
            let served = static_files::serve(
                assets.as_ref(),
                &path,
                &state.config.assets.default_document,
                is_head,
            )
            .await;
            if let Some(response) = served {
                return (response, "static");
            }
        }
    }

    if state.config.assets.static_only {
        return (http::build_404_response(), "not_found");
    }

    match (&method, path.as_str()) {
        (&Method::POST, "/upload-file" | "/upload") => {
            let content_type = req
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let body = req.into_body();
            (
                gateway::handle_upload(state, content_type.as_deref(), body).await,
                "upload",
            )
        }
        (&Method::GET, "/list-files") => (gateway::handle_list(state).await, "list"),
        (&Method::POST, "/delete-file") => {
            (gateway::handle_delete(state, req.body()).await, "delete")
        }
        _ => (http::build_404_response(), "not_found"),
    }
}

/// Reject early on a declared `Content-Length` over the limit
fn exceeds_limit(req: &Request<Incoming>, max_body_size: u64) -> bool {
    let Some(value) = req.headers().get(header::CONTENT_LENGTH) else {
        return false;
    };
    match value.to_str().ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            true
        }
        Some(_) => false,
        None => {
            logger::log_warning("Invalid Content-Length header, skipping size check");
            false
        }
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header_str = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header_str(header::REFERER);
    entry.user_agent = header_str(header::USER_AGENT);
    entry
}

fn response_len(response: &Response<Full<Bytes>>) -> usize {
    use hyper::body::Body;
    usize::try_from(response.body().size_hint().exact().unwrap_or(0)).unwrap_or(0)
}
