use crate::prelude::*;
use sentry::{init, release_name, ClientInitGuard, ClientOptions};
use sentry_tracing::EventFilter;
use std::env::var;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the tracing subscriber. Errors are forwarded to Sentry when
/// `SENTRY_DSN` is set; the returned guard must outlive the run.
pub async fn set_logging() -> Result<Option<ClientInitGuard>> {
    let guard = match var("SENTRY_DSN") {
        Ok(dsn) => match dsn.trim().is_empty() {
            true => None,
            false => Some(init((
                dsn,
                ClientOptions {
                    release: release_name!(),
                    ..Default::default()
                },
            ))),
        },
        Err(_) => None,
    };

    let sentry_layer = guard.as_ref().map(|_| {
        sentry_tracing::layer().event_filter(|md| match *md.level() {
            tracing::Level::ERROR => EventFilter::Event,
            _ => EventFilter::Ignore,
        })
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry_layer)
        .try_init()?;

    match guard.is_some() {
        true => tracing::info!("Forwarding errors to Sentry"),
        false => tracing::info!("SENTRY_DSN not set, logging to stdout only"),
    }

    Ok(guard)
}
