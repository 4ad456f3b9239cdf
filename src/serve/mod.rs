//! Serving Layer
//!
//! Answers requests under a reserved URL prefix from the granted root. Every
//! request re-opens the persisted index and re-walks the tree, so it always
//! sees the current files. Any failure while resolving a request degrades to
//! passthrough: the caller then handles the request as if it had never been
//! intercepted.

pub mod inject;
pub mod server;

pub use server::{routes, serve, ServerState};

use crate::host::Host;
use crate::store::{IndexLocation, PersistedIndex};
use crate::tree::path;
use crate::tree::walker::WalkerConfig;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reserved URL prefix served from the granted root by default
pub const DEFAULT_PREFIX: &str = "/entries/";

/// Media type for files whose host declares none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Stage of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Unmatched,
    Resolving,
    Indexed,
    Found,
    NotFound,
    Served,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Unmatched => "unmatched",
            RequestState::Resolving => "resolving",
            RequestState::Indexed => "indexed",
            RequestState::Found => "found",
            RequestState::NotFound => "not-found",
            RequestState::Served => "served",
        };
        f.write_str(name)
    }
}

/// File content answered from the granted root
#[derive(Debug, Clone, PartialEq)]
pub struct ServedFile {
    /// Path of the file inside the granted root
    pub path: String,
    pub content_type: String,
    pub body: Bytes,
    /// Whether the console instrumentation was inserted
    pub injected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Not ours to answer; forward the request unchanged.
    Passthrough,
    Respond(ServedFile),
}

/// Request interceptor for the reserved prefix.
pub struct Interceptor {
    host: Arc<dyn Host>,
    index: PersistedIndex,
    prefix: String,
    walker: WalkerConfig,
}

impl Interceptor {
    pub fn new(host: Arc<dyn Host>, location: IndexLocation, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            host,
            index: PersistedIndex::new(location),
            prefix,
            walker: WalkerConfig::default(),
        }
    }

    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path inside the granted root addressed by `url_path`, if it is under
    /// the prefix.
    ///
    /// Query and fragment are dropped and the remainder is percent-decoded.
    /// `None` for URLs outside the prefix or that do not decode to UTF-8.
    pub fn residual_path(&self, url_path: &str) -> Option<String> {
        let without_query = url_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let rest = without_query.strip_prefix(self.prefix.as_str())?;
        let decoded = percent_decode_str(rest).decode_utf8().ok()?;
        Some(path::normalize_path(&format!("/{}", decoded)))
    }

    /// Decide how to answer `url_path`.
    pub async fn intercept(&self, url_path: &str) -> Interception {
        let mut state = RequestState::Unmatched;

        let Some(residual) = self.residual_path(url_path) else {
            debug!(url = url_path, %state, "Outside reserved prefix");
            return Interception::Passthrough;
        };
        advance(&mut state, RequestState::Resolving, &residual);

        let snapshot = match self
            .index
            .get_all_from_index(self.host.as_ref(), &self.walker)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %residual, error = %e, "Could not resolve request, passing through");
                advance(&mut state, RequestState::NotFound, &residual);
                return Interception::Passthrough;
            }
        };
        advance(&mut state, RequestState::Indexed, &residual);

        let Some(file) = snapshot
            .get(&residual)
            .and_then(|entry| entry.handle.as_file())
        else {
            advance(&mut state, RequestState::NotFound, &residual);
            return Interception::Passthrough;
        };
        advance(&mut state, RequestState::Found, &residual);

        let body = match file.read().await {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %residual, error = %e, "Could not read file, passing through");
                advance(&mut state, RequestState::NotFound, &residual);
                return Interception::Passthrough;
            }
        };
        let content_type = file
            .content_type()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let (body, injected) = if inject::is_root_document(&residual) {
            match inject::inject_instrumentation(&body) {
                std::borrow::Cow::Owned(out) => (Bytes::from(out), true),
                std::borrow::Cow::Borrowed(_) => (body, false),
            }
        } else {
            (body, false)
        };

        advance(&mut state, RequestState::Served, &residual);
        Interception::Respond(ServedFile {
            path: residual,
            content_type,
            body,
            injected,
        })
    }
}

fn advance(state: &mut RequestState, next: RequestState, residual: &str) {
    debug!(path = residual, from = %state, to = %next, "Request state");
    *state = next;
}
