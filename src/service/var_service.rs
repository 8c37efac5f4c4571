use crate::model::MissingStatsPolicy;
use crate::prelude::*;
use crate::scrape::scraper::ranking::{RankingMode, RankingSettings};
use crate::sheet::snapshot::WriteMode;
use anyhow::anyhow;
use std::{env, env::var, fmt, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_SPREADSHEET_TITLE: &str = "YouTube分析シート";
pub const DEFAULT_SEARCH_URL: &str = "https://yutura.net/ranking/";
pub const DEFAULT_MONTHLY_URL: &str = "https://yutura.net/ranking/mon/";
pub const DEFAULT_DECORATIVE_LABEL: &str = "チャンネル詳細";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const MAX_CANDIDATE_LIMIT: usize = 50;
pub const MIN_REQUEST_DELAY_MS: u64 = 500;

pub struct Secrets {
    pub youtube_api_key: String,
    pub service_account_json: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("youtube_api_key", &"<redacted>")
            .field("service_account_json", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub spreadsheet_title: String,
    pub spreadsheet_id: Option<String>,
    pub ranking: RankingSettings,
    pub request_delay: Duration,
    pub http_timeout: Duration,
    pub api_timeout: Duration,
    /// Turns off TLS verification for the ranking site only.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    pub write_mode: WriteMode,
    pub missing_stats: MissingStatsPolicy,
}

#[derive(Debug)]
pub struct Config {
    pub secrets: Secrets,
    pub settings: Settings,
}

/// Loads `variables.env` beside the executable, then `.env` from the working
/// directory. Variables already set in the process win.
pub fn load_env_file() -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    if let Some(env_path) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|parent| parent.join("variables.env")))
    {
        if env_path.exists() && dotenvy::from_path(&env_path).is_ok() {
            loaded.push(env_path);
        }
    }

    if let Ok(path) = dotenvy::dotenv() {
        loaded.push(path);
    }

    loaded
}

pub async fn get_config() -> Result<Config> {
    let secrets = Secrets {
        youtube_api_key: get_required("YOUTUBE_API_KEY")?,
        service_account_json: get_required("GOOGLE_JSON_DATA")?,
    };

    let mode: RankingMode = get_parsed("RANKING_MODE", RankingMode::Keyword)?;
    let default_limit = match mode {
        RankingMode::Keyword => 15,
        RankingMode::Monthly => 20,
    };
    let limit: usize = get_parsed("CANDIDATE_LIMIT", default_limit)?;
    if limit == 0 || limit > MAX_CANDIDATE_LIMIT {
        let err = format!(
            "CANDIDATE_LIMIT must be between 1 and {}, got {}",
            MAX_CANDIDATE_LIMIT, limit
        );
        tracing::error!(err);
        return Err(anyhow!(err));
    }

    let write_mode = WriteMode::from_parts(
        &get_optional("WRITE_MODE").unwrap_or_else(|| "anchor".to_string()),
        &get_optional("WRITE_ANCHOR").unwrap_or_else(|| "A3".to_string()),
    )
    .context("Invalid WRITE_MODE/WRITE_ANCHOR")?;

    let missing_stats = parse_missing_stats(
        &get_optional("MISSING_STATS").unwrap_or_else(|| "zero".to_string()),
    )?;

    let settings = Settings {
        spreadsheet_title: get_optional("SPREADSHEET_TITLE")
            .unwrap_or_else(|| DEFAULT_SPREADSHEET_TITLE.to_string()),
        spreadsheet_id: get_optional("SPREADSHEET_ID"),
        ranking: RankingSettings {
            mode,
            search_url: get_optional("RANKING_SEARCH_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            monthly_url: get_optional("RANKING_MONTHLY_URL")
                .unwrap_or_else(|| DEFAULT_MONTHLY_URL.to_string()),
            limit,
            decorative_label: DEFAULT_DECORATIVE_LABEL.to_string(),
        },
        request_delay: request_delay(get_parsed("REQUEST_DELAY_MS", MIN_REQUEST_DELAY_MS)?)?,
        http_timeout: Duration::from_secs(get_parsed("HTTP_TIMEOUT_SECS", 15)?),
        api_timeout: Duration::from_secs(get_parsed("API_TIMEOUT_SECS", 30)?),
        accept_invalid_certs: parse_flag(
            "ACCEPT_INVALID_CERTS",
            get_optional("ACCEPT_INVALID_CERTS"),
            true,
        )?,
        user_agent: get_optional("USER_AGENT")
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        write_mode,
        missing_stats,
    };

    Ok(Config { secrets, settings })
}

fn get_required(name: &str) -> Result<String> {
    match var(name) {
        Ok(value) => match value.trim().is_empty() {
            true => {
                let err = format!("{} is empty", name);
                tracing::error!(err);
                Err(anyhow!(err))
            }
            false => Ok(value),
        },
        Err(e) => {
            let err = format!("{} not found in environment: {:?}", name, e);
            tracing::error!(err);
            Err(anyhow!(err))
        }
    }
}

fn get_optional(name: &str) -> Option<String> {
    match var(name) {
        Ok(value) => match value.trim().is_empty() {
            true => None,
            false => Some(value.trim().to_string()),
        },
        Err(_) => None,
    }
}

fn get_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get_optional(name) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = format!("Failed to parse {}={:?}: {}", name, raw, e);
                tracing::error!(err);
                Err(anyhow!(err))
            }
        },
        None => Ok(default),
    }
}

fn parse_flag(name: &str, raw: Option<String>, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => {
            let err = format!("Failed to parse {}={:?} as a flag", name, raw);
            tracing::error!(err);
            Err(anyhow!(err))
        }
    }
}

fn parse_missing_stats(raw: &str) -> Result<MissingStatsPolicy> {
    match raw.to_ascii_lowercase().as_str() {
        "zero" => Ok(MissingStatsPolicy::ZeroFill),
        "mark" => Ok(MissingStatsPolicy::MarkPartial),
        other => {
            let err = format!("MISSING_STATS must be \"zero\" or \"mark\", got {:?}", other);
            tracing::error!(err);
            Err(anyhow!(err))
        }
    }
}

// Floor on the pause between detail-page fetches.
fn request_delay(millis: u64) -> Result<Duration> {
    if millis < MIN_REQUEST_DELAY_MS {
        let err = format!(
            "REQUEST_DELAY_MS must be at least {}, got {}",
            MIN_REQUEST_DELAY_MS, millis
        );
        tracing::error!(err);
        return Err(anyhow!(err));
    }

    Ok(Duration::from_millis(millis))
}
