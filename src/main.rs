use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use meteorite_etl::app::ports::BatchLoader;
use meteorite_etl::config::Config;
use meteorite_etl::constants;
use meteorite_etl::infra::{JsonFileLoader, NominatimGeocoder, SocrataPageSource};
use meteorite_etl::pipeline::processing::classify::classify;
use meteorite_etl::pipeline::{ExtractionCoordinator, PipelineOrchestrator, RunOutcome};
use meteorite_etl::logging;
use meteorite_etl::metrics::init_metrics;

#[derive(Parser)]
#[command(name = "meteorite_etl")]
#[command(about = "Extract, classify, geocode and load NASA meteorite landings")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = constants::CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full extract → transform → load pipeline
    Run {
        /// Number of concurrent extraction workers
        #[arg(long)]
        workers: Option<usize>,
        /// Exclusive upper bound of the offsets to extract
        #[arg(long)]
        upper_bound: Option<u64>,
        /// Directory for the JSON batch when no database is configured
        #[arg(long)]
        output_dir: Option<String>,
    },
    /// Only extract, and report what was retrieved
    Extract {
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        upper_bound: Option<u64>,
    },
    /// Print the taxonomy resolved for one or more classification codes
    Classify {
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

async fn build_loader(config: &Config) -> anyhow::Result<Arc<dyn BatchLoader>> {
    match &config.database_url {
        #[cfg(feature = "db")]
        Some(url) => {
            let loader = meteorite_etl::infra::LibsqlLoader::connect(url, config.database_auth_token.clone())
                .await
                .context("connecting to DATABASE_URL")?;
            Ok(Arc::new(loader))
        }
        #[cfg(not(feature = "db"))]
        Some(_) => bail!(
            "{} is set but this binary was built without the `db` feature",
            constants::DATABASE_URL_ENV
        ),
        None => {
            info!("No {} configured; writing the batch to {}", constants::DATABASE_URL_ENV, config.output.dir);
            Ok(Arc::new(JsonFileLoader::new(&config.output.dir)))
        }
    }
}

fn build_source(config: &Config) -> anyhow::Result<Arc<SocrataPageSource>> {
    let source = SocrataPageSource::new(&config.extraction.endpoint, config.extraction.timeout())?;
    Ok(Arc::new(source))
}

fn build_orchestrator(config: &Config, loader: Arc<dyn BatchLoader>, cancel: CancellationToken) -> anyhow::Result<PipelineOrchestrator> {
    let source = build_source(config)?;
    let geocoder = NominatimGeocoder::new(
        &config.geocoding.endpoint,
        &config.geocoding.user_agent,
        config.geocoding.timeout(),
    )?;
    Ok(PipelineOrchestrator::new(source, Arc::new(geocoder), loader)
        .with_plan(config.extraction.plan())
        .with_policy(config.geocoding.policy())
        .with_cancellation(cancel))
}

fn apply_overrides(config: &mut Config, workers: Option<usize>, upper_bound: Option<u64>) -> anyhow::Result<()> {
    if let Some(workers) = workers {
        config.extraction.workers = workers;
    }
    if let Some(upper_bound) = upper_bound {
        config.extraction.upper_bound = upper_bound;
    }
    config.validate()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config).context("loading configuration")?;

    logging::init_logging(&config.output.log_dir);
    if let Some(port) = config.metrics_port {
        init_metrics(port);
    }

    // Ctrl-C stops the transform between geocoding attempts
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Run { workers, upper_bound, output_dir } => {
            apply_overrides(&mut config, workers, upper_bound)?;
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            println!("🚀 Running meteorite ETL...");
            let loader = build_loader(&config).await?;
            let orchestrator = build_orchestrator(&config, loader, cancel)?;

            match orchestrator.run().await? {
                RunOutcome::Loaded(summary) => {
                    println!("\n📊 Run results:");
                    println!("   Extracted: {}", summary.extracted);
                    println!("   Accepted: {}", summary.accepted);
                    println!("   Rejected: {}", summary.rejected);
                    for (reason, count) in &summary.rejections {
                        println!("     - {}: {}", reason, count);
                    }
                    println!("   Geocoder calls: {} ({} cache hits)", summary.geocode_calls, summary.cache_hits);
                    println!("   Loaded {} rows into {}", summary.rows_loaded, summary.load_target);
                }
                RunOutcome::ExtractionFailed { failed_ranges, records_recovered } => {
                    println!("❌ One or more extraction ranges failed; nothing was loaded.");
                    println!("   Records recovered before failure: {}", records_recovered);
                    for range in &failed_ranges {
                        println!("   Failed range: {}", range);
                    }
                    std::process::exit(2);
                }
            }
        }
        Commands::Extract { workers, upper_bound } => {
            apply_overrides(&mut config, workers, upper_bound)?;
            let report = ExtractionCoordinator::new(build_source(&config)?, config.extraction.plan())
                .run()
                .await;

            println!("📡 Extracted {} records in {} pages", report.records.len(), report.pages_fetched);
            for range in &report.failed_ranges {
                println!("   Failed range: {}", range);
            }
            if !report.is_complete() {
                std::process::exit(2);
            }
        }
        Commands::Classify { codes } => {
            for code in codes {
                match classify(&code) {
                    Some(taxonomy) => println!("{code}: {}", serde_json::to_string(&taxonomy)?),
                    None => println!("{code}: unclassifiable"),
                }
            }
        }
    }
    Ok(())
}
