// ============================================================================
// Job Processor
// ============================================================================
//
// A job body is one absolute URL (UTF-8). Flow:
// 1. Parse the URL; anything unusable is InvalidJob
// 2. Already in the dedup store -> Skipped
// 3. Fetch the page and extract same-host links
// 4. Publish every link not yet seen, waiting for each confirm
// 5. Record the page as seen
//
// The page is marked only after all its links are confirmed. A link can be
// published more than once; step 2 skips the duplicates.
//
// ============================================================================

use crate::crawler::extract_urls;
use crate::error::ProcessError;
use crate::worker::state::WorkerState;
use tracing::debug;
use url::Url;

/// Content type of published crawl jobs
pub const JOB_CONTENT_TYPE: &str = "text/plain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// Page fetched and its new links published
    Crawled { published: usize },
    /// Page was already seen within the dedup TTL
    Skipped,
}

/// Decode a job body into the URL to crawl
pub fn parse_job(body: &[u8], host: &str) -> Result<Url, ProcessError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| ProcessError::InvalidJob("body is not UTF-8".to_string()))?
        .trim();

    let mut url =
        Url::parse(text).map_err(|e| ProcessError::InvalidJob(format!("{}: {:?}", e, text)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProcessError::InvalidJob(format!("unsupported scheme: {}", url.scheme())));
    }
    if url.host_str() != Some(host) {
        return Err(ProcessError::InvalidJob(format!("{} is outside {}", url, host)));
    }

    url.set_fragment(None);
    Ok(url)
}

pub async fn process_delivery(
    state: &WorkerState,
    body: &[u8],
) -> Result<ProcessResult, ProcessError> {
    let url = parse_job(body, state.host())?;

    if state.store.exists(url.as_str()).await? {
        debug!(url = %url, "Already crawled, skipping");
        return Ok(ProcessResult::Skipped);
    }

    let page = state.fetcher.fetch(&url).await?;
    let links = if page.is_html() {
        extract_urls(&page.body, &page.url)
    } else {
        Vec::new()
    };

    let broker = &state.config.broker;
    let mut published = 0;
    for link in links.iter().filter(|link| link.host_str() == Some(state.host())) {
        if state.store.exists(link.as_str()).await? {
            continue;
        }

        let tag = state
            .broker
            .publish(
                &broker.exchange,
                &broker.routing_key,
                JOB_CONTENT_TYPE,
                link.as_str().as_bytes(),
            )
            .await?;
        debug!(url = %link, tag = %tag, "Link published");
        published += 1;
    }

    state.store.add(url.as_str()).await?;

    debug!(url = %url, found = links.len(), published, "Page crawled");
    Ok(ProcessResult::Crawled { published })
}
