//! The HTTP and WebSocket surface.
//!
//! `GET /` renders the page template with the request host substituted;
//! a handful of static assets are served next to it; `GET /ws` upgrades to
//! the frame channel and enrolls the connection as a waiting player. All
//! other paths are 404.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use tokio::sync::mpsc;
use tower_http::services::ServeFile;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::session::{run_sender, Player, WsFrameSource};
use crate::stats::PlayerCounter;

/// Placeholder in the page template replaced by the request host.
const HOST_PLACEHOLDER: &str = "{{host}}";

/// Shared state behind the router.
pub struct AppState {
    /// The page template, read once at startup.
    pub index_html: String,
    /// Live connection counter feeding the `stat` pushes.
    pub counter: PlayerCounter,
    /// Sending side of the waiting pool.
    pub waiting: mpsc::Sender<Player>,
    /// Service configuration.
    pub config: ServerConfig,
}

/// Build the router over the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let assets = &state.config.assets_dir;
    Router::new()
        .route("/", get(index))
        .route_service("/chess.js", ServeFile::new(assets.join("chess.js")))
        .route_service("/chess.css", ServeFile::new(assets.join("chess.css")))
        .route_service("/bg.png", ServeFile::new(assets.join("bg.png")))
        .route_service("/favicon.ico", ServeFile::new(assets.join("favicon.ico")))
        .route("/ws", get(upgrade))
        .with_state(state)
}

/// Serve the index page with the host substituted into the template.
async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Html<String> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    Html(state.index_html.replace(HOST_PLACEHOLDER, &escape_host(host)))
}

/// Escape a host value for the template. The placeholder sits inside a JS
/// string literal in a `<script>` tag, so quotes, backslashes and anything
/// that could close the surrounding tag must not pass through verbatim. The
/// `Host` header is attacker-controlled.
fn escape_host(host: &str) -> String {
    let mut escaped = String::with_capacity(host.len());
    for ch in host.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '/' => escaped.push_str("\\/"),
            '<' => escaped.push_str("\\x3c"),
            '>' => escaped.push_str("\\x3e"),
            '&' => escaped.push_str("\\x26"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Upgrade to the frame channel.
async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

/// Run one WebSocket session: spawn the sender task, enroll the player in
/// the waiting pool and stay alive until the session tears down.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    tracing::info!(peer = %peer, "connected");
    let guard = state.counter.connect();

    let (sink, stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel(state.config.out_capacity);
    let sender = tokio::spawn(run_sender(
        sink,
        out_rx,
        state.counter.clone(),
        state.config.stats_interval,
    ));

    let player = Player::new(Box::new(WsFrameSource::new(stream)), out_tx);
    if let Err(refused) = enroll(&state, player) {
        tracing::warn!(peer = %peer, error = %refused, "refusing player");
    }

    // the session lives exactly as long as its sender task
    let _ = sender.await;
    drop(guard);
    tracing::info!(peer = %peer, "disconnected");
}

/// Enroll a player in the waiting pool. On refusal the player is dropped,
/// which closes its outbound queue and tears the session down.
fn enroll(state: &AppState, player: Player) -> Result<(), ServerError> {
    state.waiting.try_send(player).map_err(|refused| match refused {
        mpsc::error::TrySendError::Full(_) => ServerError::WaitingPoolFull,
        mpsc::error::TrySendError::Closed(_) => ServerError::ConnectionClosed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::testing::scripted_player;

    const TEMPLATE: &str = "<script>var wsURL = \"ws://{{host}}/ws\";</script>";

    fn test_state(waiting_capacity: usize) -> (Arc<AppState>, mpsc::Receiver<Player>) {
        let (waiting, waiting_rx) = mpsc::channel(waiting_capacity);
        let state = Arc::new(AppState {
            index_html: TEMPLATE.to_string(),
            counter: PlayerCounter::new(),
            waiting,
            config: ServerConfig::default(),
        });
        (state, waiting_rx)
    }

    fn host_headers(host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, host.parse().expect("header value"));
        headers
    }

    #[test]
    fn escape_host_passes_ordinary_hosts_through() {
        assert_eq!(
            escape_host("chess.example.org:8000"),
            "chess.example.org:8000"
        );
    }

    #[test]
    fn escape_host_neutralizes_script_breakers() {
        assert_eq!(
            escape_host("a\"b\\c<d>e/f&g'h"),
            "a\\\"b\\\\c\\x3cd\\x3ee\\/f\\x26g\\'h"
        );
    }

    #[tokio::test]
    async fn index_substitutes_the_request_host() {
        let (state, _waiting_rx) = test_state(4);
        let Html(page) = index(State(state), host_headers("chess.example.org:8000")).await;
        assert_eq!(
            page,
            "<script>var wsURL = \"ws://chess.example.org:8000/ws\";</script>"
        );
        assert!(!page.contains(HOST_PLACEHOLDER));
    }

    #[tokio::test]
    async fn index_defuses_a_hostile_host_header() {
        let (state, _waiting_rx) = test_state(4);
        let hostile = "a\"</script><script>alert(1)";
        let Html(page) = index(State(state), host_headers(hostile)).await;
        assert!(!page.contains("</script><script>"));
        assert!(page.contains("ws://a\\\"\\x3c\\/script\\x3e\\x3cscript\\x3ealert(1)/ws"));
    }

    #[tokio::test]
    async fn index_without_a_host_header_still_renders() {
        let (state, _waiting_rx) = test_state(4);
        let Html(page) = index(State(state), HeaderMap::new()).await;
        assert!(page.contains("ws:///ws"));
    }

    #[tokio::test]
    async fn index_route_serves_the_page() {
        let (state, _waiting_rx) = test_state(4);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::HOST, "h.example:8000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("ws://h.example:8000/ws"));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (state, _waiting_rx) = test_state(4);
        let response = router(state)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_route_requires_an_upgrade() {
        let (state, _waiting_rx) = test_state(4);
        let response = router(state)
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // a plain GET reaches the upgrade extractor and is rejected there,
        // not routed to the 404 fallback
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn full_waiting_pool_refuses_and_tears_down_the_player() {
        let (state, _waiting_rx) = test_state(1);
        let (first, _first_feed, _first_out) = scripted_player(1);
        enroll(&state, first).unwrap();

        let (second, _second_feed, mut second_out) = scripted_player(1);
        let err = enroll(&state, second).unwrap_err();
        assert!(matches!(err, ServerError::WaitingPoolFull));
        // the refused player was dropped, which closed its outbound queue
        assert_eq!(second_out.recv().await, None);
    }

    #[tokio::test]
    async fn enrolling_after_the_matcher_died_reports_closure() {
        let (state, waiting_rx) = test_state(1);
        drop(waiting_rx);
        let (player, _feed, _out) = scripted_player(1);
        assert!(matches!(
            enroll(&state, player).unwrap_err(),
            ServerError::ConnectionClosed
        ));
    }
}
