//! Command-line interface definitions for the headline scraper service.
//!
//! This module defines the runtime configuration using the `clap` crate.
//! Deployment-facing settings (port, bind address, store path, source URL)
//! can also be provided through environment variables.

use crate::error::ScrapeError;
use crate::extract::{
    DEFAULT_CARD_SELECTOR, DEFAULT_LINK_SELECTOR, DEFAULT_SUMMARY_SELECTOR,
    DEFAULT_TITLE_SELECTOR, ExtractRules,
};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Command-line arguments for the scrape service.
///
/// # Examples
///
/// ```sh
/// # Defaults: port 3000, store in ./data/headlines.sled
/// scrape_headlines
///
/// # Different source page and card markup
/// scrape_headlines --source-url https://example.com/ --card-selector "article.card"
///
/// # Retry flaky sources twice, give up on each attempt after 10 seconds
/// scrape_headlines --fetch-retries 2 --fetch-timeout-secs 10
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Directory of the document store
    #[arg(short, long, env = "STORE_PATH", default_value = "./data/headlines.sled")]
    pub store_path: String,

    /// Page scraped by GET /scrape
    #[arg(long, env = "SOURCE_URL", default_value = "http://www.cracked.com/")]
    pub source_url: String,

    /// Selector for the repeated card elements
    #[arg(long, default_value = DEFAULT_CARD_SELECTOR)]
    pub card_selector: String,

    /// Selector for title text, relative to a card
    #[arg(long, default_value = DEFAULT_TITLE_SELECTOR)]
    pub title_selector: String,

    /// Selector for the anchor enclosing a card, whose href becomes the link
    #[arg(long, default_value = DEFAULT_LINK_SELECTOR)]
    pub link_selector: String,

    /// Selector for summary text, relative to a card
    #[arg(long, default_value = DEFAULT_SUMMARY_SELECTOR)]
    pub summary_selector: String,

    /// Seconds before a single fetch attempt is abandoned
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Extra fetch attempts on network failure (0 = no retries)
    #[arg(long, default_value_t = 0)]
    pub fetch_retries: usize,

    /// Maximum article writes in flight during a scrape
    #[arg(long, default_value_t = 8)]
    pub store_concurrency: usize,

    /// User-Agent sent with fetches
    #[arg(long, default_value = concat!("scrape_headlines/", env!("CARGO_PKG_VERSION")))]
    pub user_agent: String,

    /// Do not create the singleton user at startup
    #[arg(long)]
    pub no_seed_user: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Compile the configured selectors.
    pub fn extract_rules(&self) -> Result<ExtractRules, ScrapeError> {
        ExtractRules::new(
            &self.card_selector,
            &self.title_selector,
            &self.link_selector,
            &self.summary_selector,
        )
    }
}
