use crate::model::{Candidate, ChannelId};
use crate::prelude::*;
use crate::scrape::util::collapse_whitespace;
use anyhow::anyhow;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Which anchors on a ranking page count as links to a channel detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorFilter {
    /// Search results: any `/channel/` link whose text is not a "channel" label.
    Keyword,
    /// Monthly listing: additionally needs text, and drops the decorative
    /// "see details" button that repeats every entry.
    Monthly { decorative_label: String },
}

impl AnchorFilter {
    pub fn accepts(&self, href: &str, text: &str) -> bool {
        if !href.contains("/channel/") || text.contains("channel") {
            return false;
        }

        match self {
            AnchorFilter::Keyword => true,
            AnchorFilter::Monthly { decorative_label } => {
                !text.is_empty() && text != decorative_label
            }
        }
    }
}

pub trait Extractor {
    /// Candidates in page order, deduplicated by absolute URL.
    fn extract_candidates(&self, html: &str, base: &Url, filter: &AnchorFilter) -> Vec<Candidate>;

    /// First canonical channel id embedded in a detail page.
    fn extract_identifier(&self, html: &str) -> Option<ChannelId>;
}

pub struct AnchorExtractor {
    anchors: Selector,
    channel_url: Regex,
}

impl AnchorExtractor {
    pub fn new() -> Result<Self> {
        let anchors = Selector::parse("a[href]")
            .map_err(|e| anyhow!("Failed to parse anchor selector: {:?}", e))?;
        let channel_url =
            Regex::new(r"youtube\.com/channel/(UC[0-9A-Za-z_-]{22})(?:[^0-9A-Za-z_-]|$)")?;

        Ok(AnchorExtractor {
            anchors,
            channel_url,
        })
    }
}

impl Extractor for AnchorExtractor {
    fn extract_candidates(&self, html: &str, base: &Url, filter: &AnchorFilter) -> Vec<Candidate> {
        let doc = Html::parse_document(html);
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for anchor in doc.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };

            let text = collapse_whitespace(&anchor.text().collect::<String>());
            if !filter.accepts(href, &text) {
                continue;
            }

            let mut url = match base.join(href) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping unparseable href {:?}: {}", href, e);
                    continue;
                }
            };
            url.set_fragment(None);
            let url = url.to_string();

            match seen.get(&url) {
                Some(&index) => {
                    // Image links come first on some layouts; take the name from the text link.
                    if candidates[index].display_name.is_empty() {
                        candidates[index].display_name = text;
                    }
                }
                None => {
                    seen.insert(url.clone(), candidates.len());
                    candidates.push(Candidate {
                        display_name: text,
                        detail_url: url,
                    });
                }
            }
        }

        candidates
    }

    fn extract_identifier(&self, html: &str) -> Option<ChannelId> {
        self.channel_url
            .captures(html)
            .and_then(|captures| captures.get(1))
            .and_then(|id| ChannelId::parse(id.as_str()))
    }
}
