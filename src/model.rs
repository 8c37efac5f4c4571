use chrono::NaiveDate;
use std::fmt;

/// A ranking-page entry pointing at a channel detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub display_name: String,
    pub detail_url: String,
}

/// Platform channel id: `UC` followed by 22 url-safe base64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub const LEN: usize = 24;

    pub fn parse(raw: &str) -> Option<ChannelId> {
        let valid = raw.len() == Self::LEN
            && raw.starts_with("UC")
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        match valid {
            true => Some(ChannelId(raw.to_string())),
            false => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/channel/{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetrics {
    pub id: ChannelId,
    pub title: String,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
    /// Response fields that were absent or unreadable and got zero-filled.
    pub missing: Vec<&'static str>,
}

impl ChannelMetrics {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    pub date: NaiveDate,
    pub name: String,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
    pub url: String,
    pub complete: bool,
}

impl SnapshotRow {
    pub fn from_metrics(metrics: &ChannelMetrics, date: NaiveDate) -> SnapshotRow {
        SnapshotRow {
            date,
            name: metrics.title.clone(),
            subscriber_count: metrics.subscriber_count,
            view_count: metrics.view_count,
            video_count: metrics.video_count,
            url: metrics.id.watch_url(),
            complete: metrics.is_complete(),
        }
    }
}

/// What to do with statistics the metrics API left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingStatsPolicy {
    /// Write zero, nothing else in the sheet says so.
    ZeroFill,
    /// Write zero and add a completeness column to the snapshot.
    MarkPartial,
}
