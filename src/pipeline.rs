//! The scrape pipeline: fetch → parse → extract → persist.
//!
//! 1. **Fetching**: Download the source page once
//! 2. **Extraction**: Parse it and map every card element to a candidate record
//! 3. **Persisting**: Store each candidate independently, at most
//!    `concurrency` in flight, and wait for all of them
//!
//! Fetch and parse failures abort the run before anything is written.
//! Store failures are per record: they are collected into the
//! [`ScrapeReport`] and never stop the remaining candidates.

use crate::error::ScrapeError;
use crate::extract::{ExtractRules, extract_from_html};
use crate::fetch::PageSource;
use crate::models::{CandidateRecord, FailedRecord, ScrapeReport};
use crate::store::ArticleStore;
use crate::utils::resolve_link;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Run one scrape of `source_url` into `store`.
///
/// # Returns
///
/// A report with `attempted` candidates, how many `succeeded`, and one entry
/// in `errors` per candidate the store rejected.
///
/// # Errors
///
/// - [`ScrapeError::Network`] if the page cannot be fetched
/// - [`ScrapeError::Parse`] if the body is not a usable document
#[instrument(level = "info", skip(source, rules, store))]
pub async fn run_scrape<P, S>(
    source: &P,
    rules: &ExtractRules,
    store: &S,
    source_url: &str,
    concurrency: usize,
) -> Result<ScrapeReport, ScrapeError>
where
    P: PageSource + ?Sized,
    S: ArticleStore + ?Sized,
{
    let t0 = Instant::now();

    let html = source.fetch(source_url).await.inspect_err(|e| {
        error!(error = %e, "Fetching source failed; nothing persisted");
    })?;

    let candidates: Vec<CandidateRecord> = extract_from_html(&html, rules)?
        .into_iter()
        .map(|mut record| {
            record.link = record.link.map(|href| resolve_link(source_url, &href));
            record
        })
        .collect();
    let attempted = candidates.len();
    info!(attempted, "Extracted candidates");

    let outcomes: Vec<Result<(), FailedRecord>> = stream::iter(candidates)
        .map(|record| async move {
            match store.create(record.clone()).await {
                Ok(article) => {
                    debug!(id = %article.id, "Persisted article");
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, title = ?record.title, "Failed to persist article");
                    Err(FailedRecord {
                        record,
                        error: e.to_string(),
                    })
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let errors: Vec<FailedRecord> = outcomes.into_iter().filter_map(Result::err).collect();
    let report = ScrapeReport {
        source: source_url.to_string(),
        attempted,
        succeeded: attempted - errors.len(),
        errors,
    };

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.errors.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Scrape complete"
    );
    Ok(report)
}
