//! sitescan CLI
//!
//! Local execution entry point. The `scan` command needs the `chromium` feature.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sitescan::{
    error::Result,
    models::Config,
    pipeline,
    services::{HttpFingerprinter, LinkDiscovery, QualityAnalyzer, UrlRules, classifier},
    storage::{LocalStorage, ResultStore},
    utils::http,
};

/// sitescan - Structural page sampling and multi-viewport scanning
#[derive(Parser, Debug)]
#[command(
    name = "sitescan",
    version,
    about = "Cluster a site's pages by structure and scan a representative sample"
)]
struct Cli {
    /// Path to storage directory for config, run records and screenshots
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and cluster pages from static HTML, without a browser
    Classify {
        /// Start URL
        url: String,

        /// Print the sample as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the full pipeline: Discover → Classify → Scan
    #[cfg(feature = "chromium")]
    Scan {
        /// Start URL
        url: String,
    },

    /// Analyze a screenshot for blank or white renders
    Quality {
        /// PNG or JPEG file
        path: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Show the latest run summary
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(path) = cli.config.as_ref().filter(|p| !p.exists()) {
        log::error!("Config file not found at {}", path.display());
        return Err(sitescan::error::AppError::config("Config file not found"));
    }
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let config = if config_path.exists() {
        Config::load_or_default(&config_path)
    } else {
        log::debug!("No config at {}, using defaults", config_path.display());
        Config::default()
    };
    let config = Arc::new(config);
    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Classify { url, json } => {
            config.validate()?;
            let client = http::create_async_client(&config.crawler)?;
            let rules = UrlRules::from_config(&config.classifier, &config.crawler)?;
            let urls = LinkDiscovery::new(client.clone(), rules, config.crawler.max_pages)
                .discover(&url)
                .await?;

            let (engine, sampler) = classifier::from_config(&config)?;
            let source = HttpFingerprinter::with_client(client);
            let result = pipeline::classify_pages(
                &source,
                &urls,
                config.classifier.extract_concurrency,
                &engine,
                &sampler,
            )
            .await;

            for cluster in &result.clusters {
                log::info!(
                    "Cluster #{} [{}] {} page(s), representative {}",
                    cluster.id,
                    cluster.category,
                    cluster.len(),
                    cluster.representative().url
                );
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&result.sample)?);
            } else {
                for page in &result.sample {
                    println!(
                        "#{}\t{}\t{}\t{}",
                        page.cluster_id,
                        page.category,
                        page.page_type,
                        page.url()
                    );
                }
            }
        }

        #[cfg(feature = "chromium")]
        Command::Scan { url } => {
            config.validate()?;
            let progress = sitescan::progress::ProgressReporter::default();
            let forwarder = tokio::spawn(sitescan::progress::forward_to_log(progress.subscribe()));

            let driver = Arc::new(sitescan::browser::ChromiumDriver::launch().await?);
            let outcome = pipeline::run_pipeline(
                Arc::clone(&config),
                driver.clone(),
                storage.clone(),
                progress,
                &url,
            )
            .await;

            if let Err(e) = sitescan::browser::BrowserDriver::close(driver.as_ref()).await {
                log::debug!("Browser close: {}", e);
            }
            if let Err(e) = forwarder.await {
                log::debug!("Progress forwarder: {}", e);
            }

            let outcome = outcome?;
            log::info!(
                "Run {} saved under {}",
                outcome.summary.run_id,
                storage.root().display()
            );
            for result in &outcome.results {
                log::info!(
                    "{} {} ({} error(s), {} warning(s))",
                    result.status(),
                    result.url,
                    result.count_severity(sitescan::models::Severity::Error),
                    result.count_severity(sitescan::models::Severity::Warning)
                );
            }
        }

        Command::Quality { path } => {
            let analyzer = QualityAnalyzer::new(config.quality.clone());
            let report = analyzer.analyze(path.clone()).await;
            log::info!(
                "{}: {} ({}) - {}",
                path.display(),
                report.kind,
                report.severity,
                report.message
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Validate => {
            log::info!("Validating {}...", config_path.display());

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} viewports, threshold {:.2})",
                config.viewports.len(),
                config.classifier.similarity_threshold
            );
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            match storage.latest_run().await? {
                Some(run) => {
                    log::info!("Latest run: {} ({})", run.run_id, run.status);
                    log::info!("Start URL: {}", run.start_url);
                    log::info!("Started: {}", run.started_at);
                    if let Some(finished) = run.finished_at {
                        log::info!("Finished: {}", finished);
                    }
                    log::info!(
                        "Discovered {}, clusters {}, sampled {}, scanned {}, with errors {}",
                        run.discovered,
                        run.clusters,
                        run.sampled,
                        run.pages_scanned,
                        run.pages_with_errors
                    );
                    if let Some(error) = run.error {
                        log::warn!("Error: {}", error);
                    }
                }
                None => log::info!("No runs found yet."),
            }
        }
    }

    Ok(())
}
