//! The HTTP front end: a demo test page, format landing pages, and the
//! conditional WebSocket upgrade on `/<prefix>/`.

use crate::{handshake, ws_session, AppState};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use sensor_wire::RespondFormat;
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Router {
    let prefix = state.config().prefix.trim_matches('/').to_owned();
    let root = format!("/{prefix}/");
    let format_page = format!("/{prefix}/{{format}}");
    let format_csv_page = format!("/{prefix}/{{format}}/{{csv}}");

    Router::new()
        .route(&root, any(root_handler))
        .route(&format_page, any(format_handler))
        .route(&format_csv_page, any(format_csv_handler))
        .layer(cors_layer(&state.config().httpserver_cors_allow))
        .with_state(state)
}

fn cors_layer(allow: &str) -> CorsLayer {
    if allow == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        match allow.parse() {
            Ok(origin) => CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any),
            Err(_) => {
                tracing::warn!(allow, "ws-gate: invalid httpserver-cors-allow value, falling back to no origin");
                CorsLayer::new()
            }
        }
    }
}

fn is_websocket_upgrade(req: &Request) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// `GET /<prefix>/`: a plain GET serves the demo HTML page; an
/// `Upgrade: websocket` request with a `s1,s2,…&format=` query string
/// transitions into a stream session.
async fn root_handler(State(state): State<AppState>, req: Request) -> Response {
    if req.method() != Method::GET {
        return (StatusCode::BAD_REQUEST, "").into_response();
    }
    if !is_websocket_upgrade(&req) {
        return Html(demo_page(&state.config().prefix)).into_response();
    }

    let query = req.uri().query().unwrap_or("").to_owned();
    let raw = match handshake::parse(&query, state.names()) {
        Ok(hs) => hs,
        Err(err) => {
            tracing::warn!(error = %err, "ws-gate: rejecting malformed handshake");
            return (StatusCode::BAD_REQUEST, "").into_response();
        }
    };
    let admitted = match state.admit(raw) {
        Ok(hs) => hs,
        Err(err) => {
            tracing::warn!(error = %err, "ws-gate: rejecting handshake outside the configured directory");
            return (StatusCode::BAD_REQUEST, "").into_response();
        }
    };
    if state.at_capacity() {
        return (StatusCode::SERVICE_UNAVAILABLE, "").into_response();
    }

    let (mut parts, _body) = req.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(u) => u,
        Err(rejection) => return rejection.into_response(),
    };
    let session_state = state.clone();
    upgrade.on_upgrade(move |socket| ws_session::run(socket, session_state, admitted))
}

/// `GET /<prefix>/<format>`: a landing page whose embedded script opens
/// a WebSocket with the given format; not itself an upgrade.
async fn format_handler(State(state): State<AppState>, method: Method, Path(format): Path<String>) -> Response {
    if method != Method::GET {
        return (StatusCode::BAD_REQUEST, "").into_response();
    }
    let Ok(parsed) = format.parse::<RespondFormat>() else {
        return (StatusCode::BAD_REQUEST, "").into_response();
    };
    if parsed == RespondFormat::Unknown {
        return (StatusCode::BAD_REQUEST, "").into_response();
    }
    Html(landing_page(&state.config().prefix, &format, None)).into_response()
}

/// `GET /<prefix>/<format>/<sensors-csv>`: same landing page, with a
/// preselected sensor list baked into the embedded script.
async fn format_csv_handler(
    State(state): State<AppState>,
    method: Method,
    Path((format, csv)): Path<(String, String)>,
) -> Response {
    if method != Method::GET {
        return (StatusCode::BAD_REQUEST, "").into_response();
    }
    let Ok(parsed) = format.parse::<RespondFormat>() else {
        return (StatusCode::BAD_REQUEST, "").into_response();
    };
    if parsed == RespondFormat::Unknown {
        return (StatusCode::BAD_REQUEST, "").into_response();
    }
    Html(landing_page(&state.config().prefix, &format, Some(&csv))).into_response()
}

fn demo_page(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    format!(
        r#"<!DOCTYPE html>
<html><head><title>Sensor Event Gateway</title></head>
<body>
<h1>Sensor Event Gateway test page</h1>
<p>Open a WebSocket to this same URL with a sensor id list and format, e.g.:</p>
<pre>ws = new WebSocket("ws://HOST:PORT/{prefix}/?12,32,34&format=json");
ws.onmessage = (e) => console.log(e.data);
ws.send("set:12=100");</pre>
<p>Known formats:</p>
<ul>
<li><a href="/{prefix}/json">json</a></li>
<li><a href="/{prefix}/txt">txt</a></li>
<li><a href="/{prefix}/raw">raw</a></li>
</ul>
</body></html>
"#
    )
}

fn landing_page(prefix: &str, format: &str, csv: Option<&str>) -> String {
    let prefix = prefix.trim_matches('/');
    let path = match csv {
        Some(csv) => format!("/{prefix}/?{csv}&format={format}"),
        None => format!("/{prefix}/?format={format}"),
    };
    format!(
        r#"<!DOCTYPE html>
<html><head><title>Sensor Event Gateway — {format}</title></head>
<body>
<h1>{format} stream</h1>
<script>
var ws = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "{path}");
ws.onmessage = function(e) {{ console.log(e.data); }};
</script>
</body></html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_page_lists_known_formats() {
        let page = demo_page("wsgate");
        assert!(page.contains("/wsgate/json"));
        assert!(page.contains("/wsgate/txt"));
        assert!(page.contains("/wsgate/raw"));
    }

    #[test]
    fn landing_page_embeds_preselected_csv() {
        let page = landing_page("wsgate", "json", Some("1,2,3"));
        assert!(page.contains("/wsgate/?1,2,3&format=json"));
    }
}
