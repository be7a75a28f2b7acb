//! # Scrape Headlines
//!
//! A small service that scrapes article cards from a news page into a
//! document store and serves them over HTTP, with user notes attachable to
//! any stored article.
//!
//! ## Usage
//!
//! ```sh
//! PORT=3000 STORE_PATH=./data/headlines.sled scrape_headlines
//! curl localhost:3000/scrape
//! curl localhost:3000/articles
//! ```
//!
//! ## Architecture
//!
//! `GET /scrape` runs the pipeline:
//! 1. **Fetching**: Download the configured source page (timeout, optional retries)
//! 2. **Extraction**: Map each card element to a `{title, link, summary}` record
//! 3. **Persisting**: Store every record concurrently and report per-record failures
//!
//! The sled store handle is opened here, shared with every request through
//! the router state, and flushed once the server has shut down.

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod server;
mod store;
mod utils;

#[cfg(test)]
mod testutil;

use cli::Cli;
use fetch::{HttpFetcher, RetryFetch};
use server::AppState;
use store::{Store, UserStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    info!(source = %args.source_url, store = %args.store_path, "scrape_headlines starting up");

    let rules = args.extract_rules()?;

    let store = Store::open(&args.store_path)?;
    info!(articles = store.article_count(), "Opened store");
    if args.no_seed_user {
        if store.find_user().await?.is_none() {
            warn!("Singleton user missing and seeding disabled; note creation will fail");
        }
    } else {
        let user = store.seed_user().await?;
        info!(notes = user.notes.len(), "Singleton user ready");
    }

    let fetcher = RetryFetch::new(
        HttpFetcher::new(args.fetch_timeout(), &args.user_agent)?,
        args.fetch_retries,
        Duration::from_secs(1),
    );

    let state = Arc::new(AppState {
        articles: Arc::new(store.clone()),
        store: store.clone(),
        fetcher: Arc::new(fetcher),
        rules,
        source_url: args.source_url.clone(),
        store_concurrency: args.store_concurrency,
    });

    let listener = TcpListener::bind(args.listen_addr()).await?;
    info!(addr = %args.listen_addr(), "App running");
    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.flush().await?;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
