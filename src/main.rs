mod analyzer;
mod config;
mod crawler;
mod model;
mod normalizer;
mod parser;
mod storage;
mod utils;

use config::{AppConfig, load_config};
use crawler::{CrawlOutcome, CrawlSession, HtmlSink, ProxyPool, Transport};
use model::{CrawlError, Portal};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use utils::{group_thousands, strip_punctuation, to_kebab_case};

/// Listings shown in the end-of-location summary.
const SUMMARY_SIZE: usize = 5;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting {:?} crawl of {} location(s) on {:?}, {} page(s) each",
        config.channel,
        config.locations.len(),
        config.portals,
        config.pages
    );

    let mut failed = 0;
    for portal in &config.portals {
        match crawl_portal(*portal, &config).await {
            Ok(n) => failed += n,
            Err(e) => {
                error!("Crawl of {} aborted: {}", portal, e);
                failed += config.locations.len();
            }
        }
    }

    if failed > 0 {
        warn!("{} location crawl(s) did not complete", failed);
        ExitCode::FAILURE
    } else {
        info!("All crawls finished");
        ExitCode::SUCCESS
    }
}

/// Crawls every configured location on one portal through a single session.
/// Returns the number of locations that could not be crawled.
async fn crawl_portal(portal: Portal, config: &AppConfig) -> Result<usize, Box<dyn Error>> {
    let transport = Transport::new(portal, config.transport.clone(), config.proxy.clone())?
        .with_proxy_provider(Box::new(ProxyPool::new(config.proxy_pool.clone())));
    let sink = HtmlDump::new(config.debug_html.then(|| PathBuf::from("logs/html")));
    let mut session = CrawlSession::new(
        transport,
        sink,
        portal,
        config.channel,
        config.pages,
        config.detail_quota(),
        config.strict_resolution,
    )?;

    let mut failed = 0;
    for location in &config.locations {
        info!("=== {} / {} ===", portal, location);
        match session.run(location).await {
            Ok(outcome) => {
                summarize(&outcome);
                let stem = format!("{}_{}", portal, to_kebab_case(&strip_punctuation(location)));
                if let Err(e) = storage::save_outputs(Path::new(&config.output_dir), &stem, &outcome.raw, &outcome.properties) {
                    error!("Failed to save results for {}: {}", location, e);
                    failed += 1;
                }
            }
            Err(CrawlError::Resolution(e)) => {
                error!("Skipping location '{}': {}", location, e);
                failed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(failed)
}

fn summarize(outcome: &CrawlOutcome) {
    info!(
        "'{}' ({}): {} pages, {} listings, {} detail pages, {} normalized, {} skipped, {} duplicates",
        outcome.location,
        outcome.token.value,
        outcome.pages_fetched,
        outcome.raw.len(),
        outcome.details_fetched,
        outcome.properties.len(),
        outcome.skipped,
        outcome.duplicates
    );
    for property in outcome.properties.iter().take(SUMMARY_SIZE) {
        info!(
            "£{} | {} | {} bed | {}",
            group_thousands(property.price),
            property.address,
            property.bedrooms.map(|b| b.to_string()).unwrap_or_else(|| "?".to_string()),
            property.url
        );
    }
}

/// Saves fetched pages under `logs/html` when debug dumps are enabled.
struct HtmlDump {
    folder: Option<PathBuf>,
}

impl HtmlDump {
    fn new(folder: Option<PathBuf>) -> Self {
        Self { folder }
    }
}

impl HtmlSink for HtmlDump {
    fn capture(&mut self, label: &str, html: &str) {
        let Some(folder) = &self.folder else {
            return;
        };
        if let Err(e) = fs::create_dir_all(folder) {
            warn!("Failed to create debug folder: {}", e);
            return;
        }
        let filename = folder.join(format!("{}.html", label.replace(' ', "_")));
        if let Err(e) = fs::write(&filename, html) {
            warn!("Failed to write debug HTML: {}", e);
        } else {
            info!("Saved debug HTML: {}", filename.display());
        }
    }
}
