// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded assets served by the preview proxy: the in-page debug script
//! and the iframe shell page.

/// In-page debug script served at `/__swe-swe-debug__/inject.js`.
///
/// Captures console/error/network/navigation activity, forwards it to the
/// debug hub, and answers DOM queries from the agent. Queues up to 100
/// messages while the hub socket is down.
pub const INJECT_JS: &str = r#"(function () {
  "use strict";
  if (window.__sweSweDebug) return;
  window.__sweSweDebug = true;

  var MAX_QUEUE = 100;
  var queue = [];
  var ws = null;

  function send(msg) {
    var text = JSON.stringify(msg);
    if (ws && ws.readyState === WebSocket.OPEN) {
      ws.send(text);
    } else {
      if (queue.length >= MAX_QUEUE) queue.shift();
      queue.push(text);
    }
  }

  function wsUrl() {
    var proto = location.protocol === "https:" ? "wss:" : "ws:";
    return proto + "//" + location.host + "/__swe-swe-debug__/ws";
  }

  function connect() {
    try {
      ws = new WebSocket(wsUrl());
    } catch (e) {
      setTimeout(connect, 2000);
      return;
    }
    ws.onopen = function () {
      while (queue.length > 0) ws.send(queue.shift());
      send({ t: "init", url: location.href, title: document.title });
    };
    ws.onclose = function () {
      ws = null;
      setTimeout(connect, 2000);
    };
    ws.onmessage = function (ev) {
      var msg;
      try { msg = JSON.parse(ev.data); } catch (e) { return; }
      if (msg.t === "query") {
        var el = null;
        try { el = document.querySelector(msg.selector); } catch (e) {}
        if (!el) {
          send({ t: "queryResult", id: msg.id, found: false });
          return;
        }
        var rect = el.getBoundingClientRect();
        var visible = !!(rect.width || rect.height) &&
          getComputedStyle(el).visibility !== "hidden";
        send({
          t: "queryResult",
          id: msg.id,
          found: true,
          text: el.textContent || "",
          html: (el.outerHTML || "").slice(0, 1000),
          visible: visible,
          rect: { x: rect.x, y: rect.y, width: rect.width, height: rect.height }
        });
      } else if (msg.t === "navigate" && msg.url) {
        location.href = msg.url;
      }
    };
  }

  // console.*
  ["log", "info", "warn", "error", "debug"].forEach(function (level) {
    var orig = console[level];
    console[level] = function () {
      var args = Array.prototype.slice.call(arguments).map(function (a) {
        try { return typeof a === "string" ? a : JSON.stringify(a); }
        catch (e) { return String(a); }
      });
      send({ t: "console", level: level, args: args });
      return orig.apply(console, arguments);
    };
  });

  // errors + rejections
  window.addEventListener("error", function (ev) {
    send({ t: "error", message: ev.message, source: ev.filename,
           line: ev.lineno, col: ev.colno });
  });
  window.addEventListener("unhandledrejection", function (ev) {
    var reason = "";
    try { reason = String(ev.reason && ev.reason.stack || ev.reason); } catch (e) {}
    send({ t: "rejection", reason: reason });
  });

  // fetch
  var origFetch = window.fetch;
  if (origFetch) {
    window.fetch = function (input, init) {
      var url = typeof input === "string" ? input : (input && input.url) || "";
      var method = (init && init.method) || "GET";
      var start = Date.now();
      return origFetch.apply(window, arguments).then(function (resp) {
        send({ t: "fetch", method: method, url: url, status: resp.status,
               ms: Date.now() - start });
        return resp;
      }, function (err) {
        send({ t: "fetch", method: method, url: url, error: String(err),
               ms: Date.now() - start });
        throw err;
      });
    };
  }

  // XMLHttpRequest
  var origOpen = XMLHttpRequest.prototype.open;
  var origSend = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.open = function (method, url) {
    this.__sweSwe = { method: method, url: url };
    return origOpen.apply(this, arguments);
  };
  XMLHttpRequest.prototype.send = function () {
    var meta = this.__sweSwe || {};
    var start = Date.now();
    this.addEventListener("loadend", function () {
      send({ t: "xhr", method: meta.method, url: meta.url,
             status: this.status, ms: Date.now() - start });
    });
    return origSend.apply(this, arguments);
  };

  // history navigation
  function emitNav() {
    send({ t: "urlchange", url: location.href });
    send({ t: "navstate", canGoBack: history.length > 1, url: location.href });
  }
  ["pushState", "replaceState"].forEach(function (fn) {
    var orig = history[fn];
    history[fn] = function () {
      var ret = orig.apply(history, arguments);
      emitNav();
      return ret;
    };
  });
  window.addEventListener("popstate", emitNav);

  connect();
})();
"#;

/// Shell page served at `/__swe-swe-shell__`.
///
/// Wraps the proxied app in an inner iframe so navigation state survives
/// full-page loads; relays navigation commands via the debug socket.
pub const SHELL_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>swe-swe preview</title>
<style>
  html, body { margin: 0; height: 100%; }
  iframe { border: 0; width: 100%; height: 100%; }
</style>
</head>
<body>
<iframe id="app" src="/"></iframe>
<script src="/__swe-swe-debug__/inject.js"></script>
<script>
(function () {
  var frame = document.getElementById("app");
  var proto = location.protocol === "https:" ? "wss:" : "ws:";
  var ws = new WebSocket(proto + "//" + location.host + "/__swe-swe-debug__/ws");
  ws.onmessage = function (ev) {
    var msg;
    try { msg = JSON.parse(ev.data); } catch (e) { return; }
    if (msg.t === "navigate" && msg.url) frame.src = msg.url;
    if (msg.t === "back") history.back();
    if (msg.t === "forward") history.forward();
  };
  frame.addEventListener("load", function () {
    var url = "";
    try { url = frame.contentWindow.location.href; } catch (e) {}
    if (ws.readyState === WebSocket.OPEN) {
      ws.send(JSON.stringify({ t: "navstate", url: url, frame: true }));
    }
  });
})();
</script>
</body>
</html>
"#;
