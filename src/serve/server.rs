//! HTTP front end for the interceptor.
//!
//! Every GET goes through [`Interceptor::intercept`]. Passthrough requests are
//! forwarded to the configured upstream origin, or answered with 404 when
//! there is none.

use super::{Interception, Interceptor};
use crate::error::ApiError;
use bytes::Bytes;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use warp::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::Filter;

/// Shared state of the HTTP front end
pub struct ServerState {
    interceptor: Interceptor,
    upstream: Option<String>,
    client: reqwest::Client,
}

impl ServerState {
    pub fn new(interceptor: Interceptor, upstream: Option<String>) -> Self {
        Self {
            interceptor,
            upstream: upstream.map(|u| u.trim_end_matches('/').to_string()),
            client: reqwest::Client::new(),
        }
    }
}

/// Routes answering every GET request.
pub fn routes(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let raw_query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();

    warp::get()
        .and(warp::path::full())
        .and(raw_query)
        .and(warp::any().map(move || Arc::clone(&state)))
        .and_then(
            |full: warp::path::FullPath, query: String, state: Arc<ServerState>| async move {
                Ok::<_, Infallible>(respond(&state, full.as_str(), &query).await)
            },
        )
}

/// Answer one request path.
pub async fn respond(state: &ServerState, url_path: &str, query: &str) -> Response {
    match state.interceptor.intercept(url_path).await {
        Interception::Respond(file) => {
            info!(path = %file.path, bytes = file.body.len(), injected = file.injected, "Served from workspace");
            build(StatusCode::OK, &file.content_type, file.body)
        }
        Interception::Passthrough => forward(state, url_path, query).await,
    }
}

async fn forward(state: &ServerState, url_path: &str, query: &str) -> Response {
    let Some(upstream) = &state.upstream else {
        return build(StatusCode::NOT_FOUND, "text/plain", Bytes::from_static(b"not found"));
    };
    let url = if query.is_empty() {
        format!("{}{}", upstream, url_path)
    } else {
        format!("{}{}?{}", upstream, url_path, query)
    };

    let result = async {
        let response = state.client.get(&url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(super::DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, content_type, body))
    }
    .await;

    match result {
        Ok((status, content_type, body)) => {
            let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            build(status, &content_type, body)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Upstream request failed");
            build(StatusCode::BAD_GATEWAY, "text/plain", Bytes::from_static(b"bad gateway"))
        }
    }
}

fn build(status: StatusCode, content_type: &str, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    if let Ok(value) = content_type.parse() {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CACHE_CONTROL, warp::http::HeaderValue::from_static("no-store"));
    response
}

/// Run the HTTP front end on `listen` until Ctrl-C.
pub async fn serve(state: Arc<ServerState>, listen: SocketAddr) -> Result<(), ApiError> {
    let (addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(listen, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for shutdown signal");
            }
        })
        .map_err(|e| ApiError::ServeError(format!("Failed to bind {}: {}", listen, e)))?;

    info!(%addr, "Serving workspace");
    server.await;
    info!("Server stopped");
    Ok(())
}
