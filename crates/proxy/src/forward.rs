// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP forwarding: header filtering, cookie sanitation, HTML debug-script
//! injection, and CSP rewriting for proxied responses.

use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use flate2::read::GzDecoder;
use regex::Regex;

use crate::registry::ProxyShared;

/// Tag inserted into proxied HTML documents.
pub const SCRIPT_TAG: &str = r#"<script src="/__swe-swe-debug__/inject.js"></script>"#;

/// Hop-by-hop headers that must not be forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    HOP_BY_HOP.contains(&lower.as_str())
}

/// Build the outbound client shared by one proxy server.
///
/// Redirects are passed through to the browser rather than followed, and
/// certificate validation is disabled: the backend is the user's own dev
/// server, frequently running with a self-signed certificate.
pub fn build_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(true)
        .build()?)
}

/// Strip `Domain` and `Secure` attributes so the cookie binds to the proxy
/// origin instead of the backend's.
pub fn sanitize_set_cookie(value: &str) -> String {
    value
        .split(';')
        .map(str::trim)
        .filter(|part| {
            let lower = part.to_ascii_lowercase();
            !lower.starts_with("domain=") && lower != "secure"
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// Literal pattern; the unwrap cannot fail.
#[allow(clippy::unwrap_used)]
fn head_or_body_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(?:head|body)\b[^>]*>").unwrap())
}

/// Insert the debug script tag after the first `<head …>` or `<body …>` tag.
///
/// Returns `None` when neither tag is present (the document is passed
/// through unmodified).
pub fn inject_debug_script(html: &str) -> Option<String> {
    let m = head_or_body_re().find(html)?;
    let mut out = String::with_capacity(html.len() + SCRIPT_TAG.len());
    out.push_str(&html[..m.end()]);
    out.push_str(SCRIPT_TAG);
    out.push_str(&html[m.end()..]);
    Some(out)
}

/// Loosen a Content-Security-Policy so the injected script and its
/// WebSocket connection back to the hub are permitted.
pub fn rewrite_csp(value: &str) -> String {
    let mut directives: Vec<String> =
        value.split(';').map(str::trim).filter(|d| !d.is_empty()).map(str::to_owned).collect();

    let mut has_script = false;
    let mut has_connect = false;
    for d in &mut directives {
        let lower = d.to_ascii_lowercase();
        if lower.starts_with("script-src") {
            has_script = true;
            if !lower.contains("'self'") {
                d.push_str(" 'self'");
            }
        } else if lower.starts_with("connect-src") {
            has_connect = true;
            d.push_str(" 'self' ws: wss:");
        }
    }
    if !has_script {
        directives.push("script-src 'self'".to_owned());
    }
    if !has_connect {
        directives.push("connect-src 'self' ws: wss:".to_owned());
    }
    directives.join("; ")
}

/// Themed 502 page shown when the backend refuses connections. The page
/// polls itself with HEAD every 3 seconds and reloads once the app is up.
pub fn error_page(port: u16, theme: &str) -> String {
    let (bg, fg) = if theme == "light" { ("#ffffff", "#1a1a1a") } else { ("#1a1a1a", "#e0e0e0") };
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Waiting for app</title>
<style>body{{background:{bg};color:{fg};font-family:system-ui,sans-serif;display:flex;align-items:center;justify-content:center;height:100vh;margin:0}}main{{max-width:32rem;text-align:center}}code{{background:rgba(128,128,128,.2);padding:.1em .4em;border-radius:4px}}</style>
</head><body><main>
<h1>No app is running yet</h1>
<p>Start a web server on <code>localhost:{port}</code> (the session's <code>$PORT</code>) and this page will load it automatically.</p>
<p style="opacity:.6">Checking every 3 seconds&hellip;</p>
<script>
setInterval(function() {{
  fetch(window.location.href, {{ method: "HEAD" }})
    .then(function(r) {{ if (r.ok || r.status < 500) window.location.reload(); }})
    .catch(function() {{}});
}}, 3000);
</script>
</main></body></html>"#
    )
}

/// Join the proxy target base with the request's path and query without
/// doubling slashes.
pub fn join_target(base: &str, path_and_query: &str) -> String {
    let base = base.trim_end_matches('/');
    if path_and_query.starts_with('/') {
        format!("{base}{path_and_query}")
    } else {
        format!("{base}/{path_and_query}")
    }
}

/// Forward a plain HTTP request to the backend and rewrite the response.
///
/// When `inject` is set, HTML responses receive the debug script tag and a
/// loosened CSP; gzip bodies are decoded first, brotli bodies are passed
/// through untouched.
pub async fn proxy_request(shared: &ProxyShared, req: Request, inject: bool) -> Response {
    let target = shared.target().await;
    let path_and_query =
        req.uri().path_and_query().map(|pq| pq.as_str().to_owned()).unwrap_or_else(|| "/".into());
    let url = join_target(&target, &path_and_query);

    let method = match reqwest::Method::from_bytes(req.method().as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return status_response(StatusCode::METHOD_NOT_ALLOWED, "unsupported method"),
    };

    let mut builder = shared.client.request(method, &url);
    for (name, value) in req.headers() {
        if is_hop_by_hop(name.as_str()) || name.as_str().eq_ignore_ascii_case("host") {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(err = %e, "proxy: failed to read request body");
            return status_response(StatusCode::BAD_REQUEST, "bad request body");
        }
    };
    if !body.is_empty() {
        builder = builder.body(body.to_vec());
    }

    let upstream = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!(target = %url, err = %e, "proxy: backend unreachable");
            let page = error_page(shared.backend_port, &shared.theme().await);
            return html_response(StatusCode::BAD_GATEWAY, page);
        }
    };

    rewrite_response(shared, upstream, inject).await
}

/// Copy the upstream response, applying cookie sanitation and, for HTML,
/// debug-script injection and CSP rewriting.
async fn rewrite_response(
    shared: &ProxyShared,
    upstream: reqwest::Response,
    inject: bool,
) -> Response {
    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut content_type = String::new();
    let mut content_encoding = String::new();
    let mut headers: Vec<(String, Vec<u8>)> = Vec::new();
    for (name, value) in upstream.headers() {
        let name_str = name.as_str();
        if is_hop_by_hop(name_str) {
            continue;
        }
        let lower = name_str.to_ascii_lowercase();
        match lower.as_str() {
            "set-cookie" => {
                let sanitized = sanitize_set_cookie(&String::from_utf8_lossy(value.as_bytes()));
                headers.push((lower, sanitized.into_bytes()));
                continue;
            }
            "content-security-policy" => {
                let rewritten = if inject {
                    rewrite_csp(&String::from_utf8_lossy(value.as_bytes()))
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                headers.push((lower, rewritten.into_bytes()));
                continue;
            }
            "content-type" => content_type = String::from_utf8_lossy(value.as_bytes()).into_owned(),
            "content-encoding" => {
                content_encoding = String::from_utf8_lossy(value.as_bytes()).into_owned()
            }
            _ => {}
        }
        headers.push((lower, value.as_bytes().to_vec()));
    }

    let mut body = match upstream.bytes().await {
        Ok(b) => b.to_vec(),
        Err(e) => {
            tracing::debug!(err = %e, "proxy: failed to read backend body");
            let page = error_page(shared.backend_port, &shared.theme().await);
            return html_response(StatusCode::BAD_GATEWAY, page);
        }
    };

    let is_html = content_type.to_ascii_lowercase().contains("text/html");
    let is_br = content_encoding.eq_ignore_ascii_case("br");
    if inject && is_html && !is_br {
        let decoded = if content_encoding.eq_ignore_ascii_case("gzip") {
            let mut out = Vec::new();
            match GzDecoder::new(body.as_slice()).read_to_end(&mut out) {
                Ok(_) => Some(out),
                Err(e) => {
                    tracing::debug!(err = %e, "proxy: gzip decode failed, passing body through");
                    None
                }
            }
        } else {
            Some(body.clone())
        };

        if let Some(decoded) = decoded {
            let text = String::from_utf8_lossy(&decoded).into_owned();
            if let Some(rewritten) = inject_debug_script(&text) {
                body = rewritten.into_bytes();
            } else {
                body = decoded;
            }
            headers.retain(|(n, _)| n != "content-encoding" && n != "content-length");
            headers.push(("content-length".to_owned(), body.len().to_string().into_bytes()));
        }
    }

    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        if let Ok(v) = HeaderValue::from_bytes(&value) {
            builder = builder.header(name, v);
        }
    }
    builder.body(Body::from(body)).unwrap_or_else(|_| {
        status_response(StatusCode::INTERNAL_SERVER_ERROR, "response build failed")
    })
}

fn status_response(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .body(Body::from(message.to_owned()))
        .unwrap_or_default()
}

fn html_response(status: StatusCode, html: String) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(Body::from(html))
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod tests;
