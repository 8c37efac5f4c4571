use crate::prelude::*;
use crate::service::var_service::Settings;
use anyhow::anyhow;
use reqwest::Client;
use std::fmt::Display;

/// Where ranking and detail pages come from.
pub trait PageSource {
    /// Body of `url` as text. Non-success statuses are errors.
    async fn get_text(&self, url: &str) -> Result<String>;
}

pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        if settings.accept_invalid_certs {
            tracing::warn!(
                "TLS certificate verification is disabled for ranking site requests (ACCEPT_INVALID_CERTS)"
            );
        }

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.http_timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(HttpPageSource { client })
    }
}

impl PageSource for HttpPageSource {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Non-success response from {}: {}", url, response.status()));
        }

        Ok(response.text().await?)
    }
}

pub fn notify_parse_fail<T: Display>(msg: &str, item: T) {
    let item = item.to_string();
    let preview: String = item.chars().take(300).collect();
    tracing::error!("Unexpected value while parsing HTML: {} at {}", msg, preview);
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}
