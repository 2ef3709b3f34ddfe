use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use radiocheck_common::Config;
use radiocheck_scout::discovery::{RadioBrowserClient, WebDriverLauncher};
use radiocheck_scout::infra::run_log::EventKind;
use radiocheck_scout::pipeline::{fetch_catalog, RadioCheck};
use radiocheck_scout::verification::HttpProber;

#[derive(Parser)]
#[command(name = "radiocheck", about = "Verify radio stream catalog entries and rediscover dead ones")]
struct Cli {
    /// Download the catalog from this URL (overrides CATALOG_URL)
    #[arg(long, conflicts_with = "catalog_file")]
    catalog_url: Option<String>,

    /// Read the catalog from a local file
    #[arg(long)]
    catalog_file: Option<PathBuf>,

    /// Where to write the updated catalog
    #[arg(long)]
    output: Option<PathBuf>,

    /// Where to write the JSON run log
    #[arg(long)]
    report: Option<PathBuf>,

    /// Only verify; skip the discovery cascade
    #[arg(long)]
    no_discover: bool,

    /// Show the browser window during discovery
    #[arg(long)]
    headed: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("radiocheck=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("radiocheck starting...");

    // Load config, CLI flags win
    let mut config = Config::from_env()?;
    if let Some(url) = cli.catalog_url {
        config.catalog_url = Some(url);
    }
    if let Some(path) = cli.output {
        config.output_path = path;
    }
    if cli.report.is_some() {
        config.report_path = cli.report;
    }
    if cli.no_discover {
        config.auto_discover = false;
    }
    if cli.headed {
        config.browser_headless = false;
    }
    config.log_summary();

    // Catalog
    let (text, source) = match (&cli.catalog_file, &config.catalog_url) {
        (Some(path), _) => (
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog {}", path.display()))?,
            path.display().to_string(),
        ),
        (None, Some(url)) => (fetch_catalog(url).await?, url.clone()),
        (None, None) => bail!("No catalog: pass --catalog-file or --catalog-url, or set CATALOG_URL"),
    };

    // Collaborators
    let http = Arc::new(HttpProber::new(config.connect_timeout)?);
    let registry = Arc::new(RadioBrowserClient::new(
        &config.registry_api_url,
        &config.country_code,
    )?);
    let launcher = Arc::new(WebDriverLauncher::new(
        &config.webdriver_url,
        config.browser_headless,
        config.timings.browser_warmup,
    )?);
    let check = RadioCheck::new(config.clone(), http, registry, launcher);

    let cancel = check.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let mut output = check.run(&text, &source).await?;

    tokio::fs::write(&config.output_path, &output.document)
        .await
        .with_context(|| format!("Failed to write {}", config.output_path.display()))?;
    output.log.log(EventKind::CatalogWritten {
        path: config.output_path.display().to_string(),
        updates: output.updates.len(),
    });
    info!(
        path = %config.output_path.display(),
        updates = output.updates.len(),
        "Catalog written"
    );

    if let Some(report) = &config.report_path {
        output.log.save_to_file(report, &output.stats).await?;
    }

    info!("{}", output.stats);
    Ok(())
}
