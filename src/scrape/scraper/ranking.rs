use crate::model::Candidate;
use crate::prelude::*;
use crate::scrape::extract::{AnchorFilter, Extractor};
use crate::scrape::util::{notify_parse_fail, PageSource};
use anyhow::anyhow;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    Keyword,
    Monthly,
}

impl FromStr for RankingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" | "search" => Ok(RankingMode::Keyword),
            "monthly" | "month" => Ok(RankingMode::Monthly),
            other => Err(anyhow!("expected \"keyword\" or \"monthly\", got {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankingSettings {
    pub mode: RankingMode,
    pub search_url: String,
    pub monthly_url: String,
    pub limit: usize,
    pub decorative_label: String,
}

/// One ranking page to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingRequest {
    KeywordSearch(String),
    MonthlyRanking,
}

impl RankingRequest {
    pub fn url(&self, settings: &RankingSettings) -> Result<Url> {
        match self {
            RankingRequest::KeywordSearch(keyword) => Ok(Url::parse_with_params(
                &settings.search_url,
                &[("q", keyword.as_str())],
            )?),
            RankingRequest::MonthlyRanking => Ok(Url::parse(&settings.monthly_url)?),
        }
    }

    pub fn filter(&self, settings: &RankingSettings) -> AnchorFilter {
        match self {
            RankingRequest::KeywordSearch(_) => AnchorFilter::Keyword,
            RankingRequest::MonthlyRanking => AnchorFilter::Monthly {
                decorative_label: settings.decorative_label.clone(),
            },
        }
    }
}

/// Scrapes one ranking page into at most `settings.limit` candidates.
///
/// Transport failures and non-success statuses are returned as errors; a page
/// that parses to nothing yields an empty list.
pub async fn fetch_candidates<P: PageSource, E: Extractor>(
    pages: &P,
    extractor: &E,
    settings: &RankingSettings,
    request: &RankingRequest,
) -> Result<Vec<Candidate>> {
    let url = request.url(settings)?;
    tracing::info!("Fetching ranking page {}", url);
    let html = pages
        .get_text(url.as_str())
        .await
        .with_context(|| format!("Failed to fetch ranking page {}", url))?;

    let mut candidates = extractor.extract_candidates(&html, &url, &request.filter(settings));
    if candidates.is_empty() {
        notify_parse_fail("Ranking candidates", &html);
        return Ok(candidates);
    }

    candidates.truncate(settings.limit);
    tracing::info!("Found {} candidate channels", candidates.len());

    Ok(candidates)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scrape::extract::AnchorExtractor;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub(crate) struct FakePages {
        pub pages: HashMap<String, String>,
        pub requested: RefCell<Vec<String>>,
    }

    impl FakePages {
        pub fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }
    }

    impl PageSource for FakePages {
        async fn get_text(&self, url: &str) -> Result<String> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("Non-success response from {}: 404 Not Found", url))
        }
    }

    pub(crate) fn settings(limit: usize) -> RankingSettings {
        RankingSettings {
            mode: RankingMode::Keyword,
            search_url: "https://ranking.test/ranking/".to_string(),
            monthly_url: "https://ranking.test/ranking/mon/".to_string(),
            limit,
            decorative_label: "チャンネル詳細".to_string(),
        }
    }

    pub(crate) fn ranking_html(count: usize) -> String {
        let mut html = String::from(r#"<html><body><a href="/channel/">channel</a><ol>"#);
        for i in 0..count {
            html.push_str(&format!(
                r#"<li><a href="/channel/{i}/">Creator {i}</a><a href="/channel/{i}/">チャンネル詳細</a></li>"#
            ));
        }
        html.push_str("</ol></body></html>");
        html
    }

    #[test]
    fn keyword_is_percent_encoded() {
        let url = RankingRequest::KeywordSearch("料理 vlog&more".to_string())
            .url(&settings(15))
            .unwrap();
        assert_eq!(url.host_str(), Some("ranking.test"));
        let q: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(q, vec![("q".to_string(), "料理 vlog&more".to_string())]);
    }

    #[test]
    fn mode_names() {
        assert_eq!("Monthly".parse::<RankingMode>().unwrap(), RankingMode::Monthly);
        assert_eq!("keyword".parse::<RankingMode>().unwrap(), RankingMode::Keyword);
        assert!("weekly".parse::<RankingMode>().is_err());
    }

    #[tokio::test]
    async fn caps_candidates_in_page_order() {
        let pages = FakePages::default()
            .with("https://ranking.test/ranking/mon/", &ranking_html(30));
        let extractor = AnchorExtractor::new().unwrap();
        let got = fetch_candidates(&pages, &extractor, &settings(20), &RankingRequest::MonthlyRanking)
            .await
            .unwrap();
        assert_eq!(got.len(), 20);
        assert_eq!(got[0].detail_url, "https://ranking.test/channel/0/");
        assert_eq!(got[19].display_name, "Creator 19");
    }

    #[tokio::test]
    async fn empty_page_yields_no_candidates() {
        let pages = FakePages::default()
            .with("https://ranking.test/ranking/mon/", "<html><body></body></html>");
        let extractor = AnchorExtractor::new().unwrap();
        let got = fetch_candidates(&pages, &extractor, &settings(20), &RankingRequest::MonthlyRanking)
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn unreachable_page_is_an_error() {
        let pages = FakePages::default();
        let extractor = AnchorExtractor::new().unwrap();
        let got = fetch_candidates(
            &pages,
            &extractor,
            &settings(15),
            &RankingRequest::KeywordSearch("news".to_string()),
        )
        .await;
        assert!(got.is_err());
        assert_eq!(
            pages.requested.borrow().as_slice(),
            ["https://ranking.test/ranking/?q=news".to_string()]
        );
    }
}
