use crate::model::{Candidate, ChannelId};
use crate::scrape::extract::Extractor;
use crate::scrape::util::PageSource;
use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;

/// Looks up the canonical id on a candidate's detail page. Any fetch failure
/// counts as "not found". Always waits `delay` afterwards.
pub async fn resolve_identifier<P: PageSource, E: Extractor>(
    pages: &P,
    extractor: &E,
    candidate: &Candidate,
    delay: Duration,
) -> Option<ChannelId> {
    let id = match pages.get_text(&candidate.detail_url).await {
        Ok(html) => {
            let id = extractor.extract_identifier(&html);
            if id.is_none() {
                tracing::debug!(
                    "No channel id on detail page for {:?} ({})",
                    candidate.display_name,
                    candidate.detail_url
                );
            }
            id
        }
        Err(e) => {
            tracing::warn!("Failed to fetch detail page {}: {:#}", candidate.detail_url, e);
            None
        }
    };

    if !delay.is_zero() {
        sleep(delay).await;
    }

    id
}

/// Resolves candidates in order, dropping the ones without an id. Two ranking
/// entries pointing at the same channel collapse into one.
pub async fn resolve_identifiers<P: PageSource, E: Extractor>(
    pages: &P,
    extractor: &E,
    candidates: &[Candidate],
    delay: Duration,
) -> Vec<ChannelId> {
    let mut ids = Vec::with_capacity(candidates.len());
    for (rank, candidate) in candidates.iter().enumerate() {
        if let Some(id) = resolve_identifier(pages, extractor, candidate, delay).await {
            tracing::debug!("#{} {:?} -> {}", rank + 1, candidate.display_name, id);
            ids.push(id);
        }
    }

    let ids: Vec<ChannelId> = ids.into_iter().unique().collect();
    tracing::info!(
        "Resolved {} of {} candidates to channel ids",
        ids.len(),
        candidates.len()
    );

    ids
}
