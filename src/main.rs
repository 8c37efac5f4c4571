mod model;
mod prelude;
mod scrape {
    pub mod extract;
    pub mod scraper {
        pub mod channel;
        pub mod ranking;
        pub mod youtube;
    }
    pub mod util;
}
mod service {
    pub mod log_service;
    pub mod scrape_service;
    pub mod var_service;
}
mod sheet {
    pub mod client;
    pub mod snapshot;
}

use chrono::Local;
use scrape::extract::AnchorExtractor;
use scrape::scraper::youtube::YoutubeMetrics;
use scrape::util::HttpPageSource;
use service::log_service::set_logging;
use service::scrape_service::{Halt, Pipeline};
use service::var_service::{get_config, load_env_file};
use sheet::client::GoogleSheet;
use std::process::ExitCode;

const EXIT_UNEXPECTED: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_SHEET: u8 = 9;

#[tokio::main]
async fn main() -> ExitCode {
    let env_files = load_env_file();
    let _sentry_guard = match set_logging().await {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {:#}", e);
            return ExitCode::from(EXIT_UNEXPECTED);
        }
    };
    for path in env_files {
        tracing::info!("Loaded environment from {}", path.display());
    }

    tracing::info!("Starting channel ranking snapshot");
    let config = match get_config().await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let (pages, extractor, metrics) = match (
        HttpPageSource::new(&config.settings),
        AnchorExtractor::new(),
        YoutubeMetrics::new(&config.secrets.youtube_api_key, config.settings.api_timeout),
    ) {
        (Ok(pages), Ok(extractor), Ok(metrics)) => (pages, extractor, metrics),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            tracing::error!("Failed to set up clients: {:#}", e);
            return ExitCode::from(EXIT_UNEXPECTED);
        }
    };

    let sheet = match GoogleSheet::open(&config.secrets, &config.settings).await {
        Ok(sheet) => sheet,
        Err(e) => {
            tracing::error!("Failed to open spreadsheet: {:#}", e);
            return ExitCode::from(EXIT_SHEET);
        }
    };

    let pipeline = Pipeline {
        pages: &pages,
        extractor: &extractor,
        metrics: &metrics,
        sheet: &sheet,
        settings: &config.settings,
    };

    match pipeline.run(Local::now().date_naive()).await {
        Ok(report) => {
            match report.keyword {
                Some(keyword) => tracing::info!(
                    "Done. Wrote {} channels for {:?} to the sheet",
                    report.rows_written,
                    keyword
                ),
                None => tracing::info!("Done. Wrote {} channels to the sheet", report.rows_written),
            }
            ExitCode::SUCCESS
        }
        Err(halt @ Halt::Aborted(_)) => {
            tracing::warn!("Stopped without writing: {}", halt);
            ExitCode::from(halt.exit_code())
        }
        Err(halt) => {
            tracing::error!("{}", halt);
            ExitCode::from(halt.exit_code())
        }
    }
}
