//! Development server with live reload.
//!
//! Serves the source root over HTTP. HTML responses get a small client
//! script injected before `</body>`; the client listens on a Server-Sent
//! Events stream and swaps stylesheets or reloads the page when builders
//! finish.
//!
//! ```text
//! /                   - static files from the source root
//! /__livereload       - SSE stream of reload events
//! /__livereload.js    - client script
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

pub const EVENTS_PATH: &str = "/__livereload";
pub const CLIENT_PATH: &str = "/__livereload.js";

/// Largest HTML body the injector will buffer.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

const CLIENT_TAG: &str = r#"<script src="/__livereload.js"></script>"#;

const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__livereload");
  function sameFile(href, path) {
    var url = new URL(href, location.href);
    return url.origin === location.origin && url.pathname === path;
  }
  source.addEventListener("css", function (e) {
    var paths = JSON.parse(e.data).paths;
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = 0;
    links.forEach(function (link) {
      var match = paths.some(function (p) { return sameFile(link.href, p); });
      if (!match) return;
      var url = new URL(link.href, location.href);
      url.searchParams.set("livereload", Date.now());
      link.href = url.toString();
      swapped++;
    });
    if (swapped === 0) location.reload();
  });
  source.addEventListener("js", function () { location.reload(); });
  source.addEventListener("reload", function () { location.reload(); });
})();
"#;

static BODY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("static pattern"));

/// Dev server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Message pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadEvent {
    /// Stylesheets changed; swap the listed URL paths in place
    Css { paths: Vec<String> },
    /// Scripts changed
    Js { paths: Vec<String> },
    /// Anything else; reload the whole page
    Reload,
}

impl ReloadEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Css { .. } => "css",
            ReloadEvent::Js { .. } => "js",
            ReloadEvent::Reload => "reload",
        }
    }

    /// Pick the event for a set of changed files under `root`.
    ///
    /// Returns `None` for an empty set.
    pub fn classify(root: &Path, paths: &[PathBuf]) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        let all_with = |ext: &str| {
            paths.iter().all(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
        };
        let urls = || paths.iter().map(|p| url_path(root, p)).collect();

        Some(if all_with("css") {
            ReloadEvent::Css { paths: urls() }
        } else if all_with("js") {
            ReloadEvent::Js { paths: urls() }
        } else {
            ReloadEvent::Reload
        })
    }
}

/// URL path under which `path` is served from `root`.
fn url_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    format!("/{}", parts.join("/"))
}

/// Broadcast hub between builders and connected browsers.
///
/// Cheap to clone; every clone feeds the same subscribers.
#[derive(Debug, Clone)]
pub struct LiveReload {
    root: PathBuf,
    sender: broadcast::Sender<ReloadEvent>,
}

impl LiveReload {
    /// Create a hub for files served from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { root: root.into(), sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Announce rebuilt files.
    pub fn notify(&self, paths: &[PathBuf]) {
        if let Some(event) = ReloadEvent::classify(&self.root, paths) {
            self.send(event);
        }
    }

    /// Ask every browser to reload the page.
    pub fn reload(&self) {
        self.send(ReloadEvent::Reload);
    }

    fn send(&self, event: ReloadEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(clients) => tracing::debug!(event = name, clients, "live reload sent"),
            Err(_) => tracing::trace!(event = name, "no live reload clients"),
        }
    }
}

#[derive(Clone)]
struct ServerState {
    hub: LiveReload,
    shutdown: CancellationToken,
}

/// Build the dev server router for `root`.
pub fn router(root: &Path, hub: LiveReload, shutdown: CancellationToken) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(events))
        .route(CLIENT_PATH, get(client_script))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject_client))
        .with_state(ServerState { hub, shutdown })
}

/// Bind `host:port` and serve `root` until `cancel` fires.
pub async fn serve(
    host: &str,
    port: u16,
    root: PathBuf,
    hub: LiveReload,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|source| ServerError::Bind { addr: format!("{}:{}", host, port), source })?;
    serve_listener(listener, root, hub, cancel).await
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve_listener(
    listener: TcpListener,
    root: PathBuf,
    hub: LiveReload,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("serving {} on http://{}", root.display(), addr);
    }

    let app = router(&root, hub, cancel.clone());
    axum::serve(listener, app).with_graceful_shutdown(cancel.cancelled_owned()).await?;

    tracing::debug!("dev server stopped");
    Ok(())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], CLIENT_SCRIPT)
}

/// SSE stream of reload events. Ends when the server shuts down so that
/// graceful shutdown is not held open by connected browsers.
async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.hub.subscribe();
    let (tx, out) = mpsc::channel(16);
    tracing::debug!(clients = state.hub.client_count(), "live reload client connected");
    tokio::spawn(forward_events(rx, tx, state.shutdown));

    let stream = ReceiverStream::new(out)
        .map(|event| Event::default().event(event.name()).json_data(&event));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Copy hub events to one client until it disconnects, the hub closes or
/// `shutdown` fires.
async fn forward_events(
    mut rx: broadcast::Receiver<ReloadEvent>,
    tx: mpsc::Sender<ReloadEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tx.closed() => break,
            msg = rx.recv() => match msg {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live reload client lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!("live reload client gone");
}

async fn inject_client(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("failed to buffer HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Non-UTF-8 pages go out untouched.
    let html = match std::str::from_utf8(&bytes) {
        Ok(text) => inject_script(text),
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Response::from_parts(parts, Body::from(html))
}

/// Insert the client script tag before the first `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    match BODY_CLOSE.find(html) {
        Some(m) => format!("{}{}{}", &html[..m.start()], CLIENT_TAG, &html[m.start()..]),
        None => format!("{}{}", html, CLIENT_TAG),
    }
}
