// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn hop_by_hop_detection() {
    assert!(is_hop_by_hop("Connection"));
    assert!(is_hop_by_hop("transfer-encoding"));
    assert!(is_hop_by_hop("KEEP-ALIVE"));
    assert!(is_hop_by_hop("Upgrade"));
    assert!(!is_hop_by_hop("Content-Type"));
    assert!(!is_hop_by_hop("Set-Cookie"));
}

#[test]
fn cookie_loses_domain_and_secure() {
    let got = sanitize_set_cookie("s=1; Domain=api.example.com; Secure; Path=/");
    assert_eq!(got, "s=1; Path=/");
}

#[test]
fn cookie_without_attributes_unchanged() {
    assert_eq!(sanitize_set_cookie("token=abc; Path=/; HttpOnly"), "token=abc; Path=/; HttpOnly");
}

#[test]
fn cookie_domain_case_insensitive() {
    let got = sanitize_set_cookie("s=1; domain=.example.com; SECURE");
    assert_eq!(got, "s=1");
}

#[test]
fn injects_after_head() {
    let html = "<html><head><title>x</title></head><body>y</body></html>";
    let got = inject_debug_script(html).unwrap_or_default();
    assert!(got.contains(&format!("<head>{SCRIPT_TAG}<title>")));
    assert!(got.contains("<body>y</body>"));
    assert_eq!(got.matches(SCRIPT_TAG).count(), 1);
}

#[test]
fn injects_after_body_when_no_head() {
    let html = r#"<html><body class="app">y</body></html>"#;
    let got = inject_debug_script(html).unwrap_or_default();
    assert!(got.contains(&format!(r#"<body class="app">{SCRIPT_TAG}y"#)));
}

#[test]
fn injects_after_first_match_only() {
    let html = "<head></head><body></body>";
    let got = inject_debug_script(html).unwrap_or_default();
    assert_eq!(got.matches(SCRIPT_TAG).count(), 1);
    assert!(got.starts_with(&format!("<head>{SCRIPT_TAG}")));
}

#[test]
fn injection_skips_tagless_documents() {
    assert!(inject_debug_script("plain text, no markup").is_none());
    // <header> must not match <head ...>
    assert!(inject_debug_script("<header>nav</header>").is_none());
}

#[test]
fn csp_appends_to_existing_directives() {
    let got = rewrite_csp("default-src 'none'; script-src cdn.example.com; connect-src 'none'");
    assert!(got.contains("script-src cdn.example.com 'self'"));
    assert!(got.contains("connect-src 'none' 'self' ws: wss:"));
}

#[test]
fn csp_adds_missing_directives() {
    let got = rewrite_csp("default-src 'self'");
    assert!(got.contains("script-src 'self'"));
    assert!(got.contains("connect-src 'self' ws: wss:"));
}

#[test]
fn csp_does_not_duplicate_self_in_script_src() {
    let got = rewrite_csp("script-src 'self' cdn.example.com");
    assert_eq!(got.matches("script-src").count(), 1);
    assert_eq!(got.matches("'self'").count(), 2); // script-src original + connect-src
}

#[test]
fn target_join_single_slash() {
    assert_eq!(join_target("http://localhost:3000", "/a/b?q=1"), "http://localhost:3000/a/b?q=1");
    assert_eq!(join_target("http://localhost:3000/", "/a"), "http://localhost:3000/a");
    assert_eq!(join_target("http://localhost:3000", "a"), "http://localhost:3000/a");
}

#[test]
fn error_page_mentions_port_and_polls() {
    let page = error_page(3005, "dark");
    assert!(page.contains("localhost:3005"));
    assert!(page.contains("HEAD"));
    assert!(page.contains("3000)"));
}
