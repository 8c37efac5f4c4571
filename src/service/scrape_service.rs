use crate::model::{ChannelMetrics, MissingStatsPolicy};
use crate::scrape::extract::Extractor;
use crate::scrape::scraper::channel::resolve_identifiers;
use crate::scrape::scraper::ranking::{fetch_candidates, RankingMode, RankingRequest};
use crate::scrape::scraper::youtube::MetricsSource;
use crate::scrape::util::PageSource;
use crate::service::var_service::Settings;
use crate::sheet::client::SheetStore;
use crate::sheet::snapshot::{build_grid, build_rows, write_snapshot};
use chrono::NaiveDate;
use std::fmt;

/// Cell holding the search keyword.
pub const KEYWORD_CELL: &str = "B1";

/// Non-fatal stops. Nothing has been written when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    NoKeyword,
    RankingUnavailable,
    NoCandidates,
    NoIdentifiers,
    NoMetrics,
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Abort::NoKeyword => "No search keyword in the keyword cell",
            Abort::RankingUnavailable => "Ranking page could not be fetched",
            Abort::NoCandidates => "Ranking page had no channel candidates",
            Abort::NoIdentifiers => "No candidate resolved to a YouTube channel id; try another keyword",
            Abort::NoMetrics => "YouTube API returned no channel data",
        };
        f.write_str(reason)
    }
}

#[derive(Debug)]
pub enum Halt {
    Aborted(Abort),
    MetricsFailed(anyhow::Error),
    SheetFailed(anyhow::Error),
}

impl Halt {
    pub fn exit_code(&self) -> u8 {
        match self {
            Halt::Aborted(Abort::NoKeyword) => 3,
            Halt::Aborted(Abort::RankingUnavailable) => 4,
            Halt::Aborted(Abort::NoCandidates) => 5,
            Halt::Aborted(Abort::NoIdentifiers) => 6,
            Halt::Aborted(Abort::NoMetrics) => 7,
            Halt::MetricsFailed(_) => 8,
            Halt::SheetFailed(_) => 9,
        }
    }
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Aborted(abort) => write!(f, "{}", abort),
            Halt::MetricsFailed(e) => write!(f, "YouTube API call failed: {:#}", e),
            Halt::SheetFailed(e) => write!(f, "Spreadsheet call failed: {:#}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub keyword: Option<String>,
    pub rows_written: usize,
}

/// Everything one run talks to.
pub struct Pipeline<'a, P, E, M, S> {
    pub pages: &'a P,
    pub extractor: &'a E,
    pub metrics: &'a M,
    pub sheet: &'a S,
    pub settings: &'a Settings,
}

impl<'a, P, E, M, S> Pipeline<'a, P, E, M, S>
where
    P: PageSource,
    E: Extractor,
    M: MetricsSource,
    S: SheetStore,
{
    /// Keyword → ranking → ids → metrics → snapshot. The sheet is only
    /// written in the last step.
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport, Halt> {
        let (request, keyword) = self.read_request().await?;

        let candidates = match fetch_candidates(
            self.pages,
            self.extractor,
            &self.settings.ranking,
            &request,
        )
        .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("{:#}", e);
                return Err(Halt::Aborted(Abort::RankingUnavailable));
            }
        };
        if candidates.is_empty() {
            return Err(Halt::Aborted(Abort::NoCandidates));
        }

        tracing::info!("Looking up YouTube ids for {} candidates", candidates.len());
        let ids = resolve_identifiers(
            self.pages,
            self.extractor,
            &candidates,
            self.settings.request_delay,
        )
        .await;
        if ids.is_empty() {
            return Err(Halt::Aborted(Abort::NoIdentifiers));
        }

        tracing::info!("Fetching YouTube statistics for {} channels", ids.len());
        let metrics: Vec<ChannelMetrics> = self
            .metrics
            .fetch_metrics(&ids)
            .await
            .map_err(Halt::MetricsFailed)?;
        if metrics.is_empty() {
            return Err(Halt::Aborted(Abort::NoMetrics));
        }

        let partial = metrics.iter().filter(|m| !m.is_complete()).count();
        if partial > 0 && self.settings.missing_stats == MissingStatsPolicy::ZeroFill {
            tracing::warn!("{} channels have zero-filled statistics", partial);
        }

        let rows = build_rows(&metrics, today);
        let grid = build_grid(&rows, self.settings.missing_stats);
        tracing::info!("Writing snapshot to the spreadsheet");
        write_snapshot(self.sheet, &grid, &self.settings.write_mode)
            .await
            .map_err(Halt::SheetFailed)?;

        Ok(RunReport {
            keyword,
            rows_written: rows.len(),
        })
    }

    async fn read_request(&self) -> Result<(RankingRequest, Option<String>), Halt> {
        match self.settings.ranking.mode {
            RankingMode::Monthly => Ok((RankingRequest::MonthlyRanking, None)),
            RankingMode::Keyword => {
                let keyword = self
                    .sheet
                    .read_cell(KEYWORD_CELL)
                    .await
                    .map_err(Halt::SheetFailed)?;
                match keyword {
                    Some(keyword) => {
                        tracing::info!("Search keyword: {}", keyword);
                        Ok((RankingRequest::KeywordSearch(keyword.clone()), Some(keyword)))
                    }
                    None => Err(Halt::Aborted(Abort::NoKeyword)),
                }
            }
        }
    }
}
