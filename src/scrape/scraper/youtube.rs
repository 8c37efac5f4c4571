use crate::model::{ChannelId, ChannelMetrics};
use crate::prelude::*;
use anyhow::anyhow;
use itertools::Itertools;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";
/// `channels.list` accepts at most this many ids per call.
pub const MAX_BATCH: usize = 50;

pub trait MetricsSource {
    /// Metrics for `ids`, in request order. Ids the API does not know are
    /// left out. An empty slice makes no request.
    async fn fetch_metrics(&self, ids: &[ChannelId]) -> Result<Vec<ChannelMetrics>>;
}

pub struct YoutubeMetrics {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl YoutubeMetrics {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(YoutubeMetrics {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            endpoint: CHANNELS_ENDPOINT.to_string(),
        })
    }
}

impl MetricsSource for YoutubeMetrics {
    async fn fetch_metrics(&self, ids: &[ChannelId]) -> Result<Vec<ChannelMetrics>> {
        let mut metrics: Vec<ChannelMetrics> = Vec::new();
        for joined in batch_ids(ids) {
            let url = Url::parse_with_params(
                &self.endpoint,
                &[
                    ("part", "snippet,statistics"),
                    ("id", joined.as_str()),
                    ("maxResults", "50"),
                ],
            )?;
            let response = self
                .client
                .get(url)
                .header("X-Goog-Api-Key", self.api_key.as_str())
                .send()
                .await
                .context("YouTube channels request failed")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Non-success response from Youtube: {}", status);
                return Err(anyhow!("YouTube channels.list returned {}: {}", status, body));
            }

            let json: Value = response
                .json()
                .await
                .context("YouTube channels response was not JSON")?;
            metrics.extend(parse_channel_list(&json));
        }

        Ok(order_by_request(ids, metrics))
    }
}

/// Comma-joined `id` parameters, one per `channels.list` call.
fn batch_ids(ids: &[ChannelId]) -> Vec<String> {
    ids.chunks(MAX_BATCH)
        .map(|batch| batch.iter().map(ChannelId::as_str).join(","))
        .collect()
}

/// Reads a `channels.list` response. A missing or empty `items` array means
/// the API had nothing for the requested ids.
pub fn parse_channel_list(json: &Value) -> Vec<ChannelMetrics> {
    let Some(items) = json["items"].as_array() else {
        tracing::info!("YouTube response has no items");
        return Vec::new();
    };

    items.iter().filter_map(parse_channel_item).collect()
}

fn parse_channel_item(item: &Value) -> Option<ChannelMetrics> {
    let Some(id) = item["id"].as_str().and_then(ChannelId::parse) else {
        tracing::warn!("Skipping YouTube item without a channel id: {}", item);
        return None;
    };

    let mut missing: Vec<&'static str> = Vec::new();
    let title = match item["snippet"]["title"].as_str() {
        Some(title) => title.to_string(),
        None => {
            missing.push("title");
            id.to_string()
        }
    };

    let statistics = &item["statistics"];
    let subscriber_count = read_count(statistics, "subscriberCount", &mut missing);
    let view_count = read_count(statistics, "viewCount", &mut missing);
    let video_count = read_count(statistics, "videoCount", &mut missing);

    if !missing.is_empty() {
        tracing::warn!(
            "Channel {} ({}) is missing {}; writing zero",
            id,
            title,
            missing.join(", ")
        );
    }

    Some(ChannelMetrics {
        id,
        title,
        subscriber_count,
        view_count,
        video_count,
        missing,
    })
}

// Counts arrive as decimal strings.
fn read_count(statistics: &Value, field: &'static str, missing: &mut Vec<&'static str>) -> u64 {
    let count = match &statistics[field] {
        Value::String(raw) => raw.parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    };

    count.unwrap_or_else(|| {
        missing.push(field);
        0
    })
}

fn order_by_request(ids: &[ChannelId], metrics: Vec<ChannelMetrics>) -> Vec<ChannelMetrics> {
    let mut by_id: HashMap<ChannelId, ChannelMetrics> =
        metrics.into_iter().map(|m| (m.id.clone(), m)).collect();

    ids.iter()
        .filter_map(|id| {
            let found = by_id.remove(id);
            if found.is_none() {
                tracing::info!("YouTube returned nothing for channel {}", id);
            }
            found
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(n: usize) -> ChannelId {
        ChannelId::parse(&format!("UC{:0>22}", n)).unwrap()
    }

    #[test]
    fn ids_are_batched_by_fifty() {
        let ids: Vec<ChannelId> = (1..=51).map(id).collect();

        assert!(batch_ids(&[]).is_empty());

        let one = batch_ids(&ids[..1]);
        assert_eq!(one, vec![id(1).as_str().to_string()]);

        let fifty = batch_ids(&ids[..50]);
        assert_eq!(fifty.len(), 1);
        assert_eq!(fifty[0].split(',').count(), 50);
        assert!(fifty[0].starts_with(id(1).as_str()));
        assert!(fifty[0].ends_with(id(50).as_str()));

        let fifty_one = batch_ids(&ids);
        assert_eq!(fifty_one.len(), 2);
        assert_eq!(fifty_one[0], fifty[0]);
        assert_eq!(fifty_one[1], id(51).as_str());
    }

    #[test]
    fn parses_snippet_and_statistics() {
        let json = json!({
            "kind": "youtube#channelListResponse",
            "items": [{
                "kind": "youtube#channel",
                "id": id(1).as_str(),
                "snippet": { "title": "Alpha Cooking" },
                "statistics": {
                    "viewCount": "123456789",
                    "subscriberCount": "987000",
                    "hiddenSubscriberCount": false,
                    "videoCount": "412"
                }
            }]
        });

        let got = parse_channel_list(&json);
        assert_eq!(
            got,
            vec![ChannelMetrics {
                id: id(1),
                title: "Alpha Cooking".to_string(),
                subscriber_count: 987000,
                view_count: 123456789,
                video_count: 412,
                missing: vec![],
            }]
        );
        assert!(got[0].is_complete());
    }

    #[test]
    fn missing_counts_are_zero_filled_and_recorded() {
        let json = json!({
            "items": [{
                "id": id(2).as_str(),
                "snippet": { "title": "Hidden Subs" },
                "statistics": { "viewCount": "10", "hiddenSubscriberCount": true, "videoCount": "oops" }
            }]
        });

        let got = parse_channel_list(&json);
        assert_eq!(got[0].subscriber_count, 0);
        assert_eq!(got[0].view_count, 10);
        assert_eq!(got[0].video_count, 0);
        assert_eq!(got[0].missing, vec!["subscriberCount", "videoCount"]);
        assert!(!got[0].is_complete());
    }

    #[test]
    fn no_items_is_empty() {
        assert!(parse_channel_list(&json!({ "pageInfo": { "totalResults": 0 } })).is_empty());
        assert!(parse_channel_list(&json!({ "items": [] })).is_empty());
    }

    #[test]
    fn items_without_valid_id_are_skipped() {
        let json = json!({
            "items": [
                { "snippet": { "title": "no id" } },
                { "id": "not-a-channel", "snippet": { "title": "bad id" } }
            ]
        });
        assert!(parse_channel_list(&json).is_empty());
    }

    #[test]
    fn results_follow_request_order_and_drop_unknown() {
        let json = json!({
            "items": [
                { "id": id(3).as_str(), "snippet": { "title": "c" }, "statistics": {} },
                { "id": id(1).as_str(), "snippet": { "title": "a" }, "statistics": {} }
            ]
        });
        let got = order_by_request(&[id(1), id(2), id(3)], parse_channel_list(&json));
        let titles: Vec<&str> = got.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }
}
