// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use swe_swe::config::Config;
use swe_swe::mcp;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // In MCP and debug one-shot modes stdout carries the protocol, so
    // logs go to stderr.
    let to_stderr = config.mcp || config.debug_query.is_some() || config.debug_listen.is_some();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if to_stderr {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let endpoint =
        mcp::default_endpoint(config.debug_endpoint.as_deref(), config.proxy_port_offset);

    if config.mcp {
        if let Err(e) = mcp::run_stdio(endpoint).await {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    if let Some(ref selector) = config.debug_query {
        match mcp::debug_query(&endpoint, selector).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                error!("debug query failed: {e:#}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(secs) = config.debug_listen {
        match mcp::debug_listen(&endpoint, std::time::Duration::from_secs(secs)).await {
            Ok(messages) => {
                for msg in messages {
                    println!("{msg}");
                }
            }
            Err(e) => {
                error!("debug listen failed: {e:#}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = swe_swe::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
