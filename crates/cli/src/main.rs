//! GeoWatch CLI - change detection and threat forecasting for monitored assets

mod records;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geowatch_algorithms::anomaly::AnomalyDetector;
use geowatch_algorithms::forecast::{growth_hotspots, ForecastModel, ForecastTarget, ModelRegistry};
use geowatch_core::sources::{CollectingSink, ContextSource, JsonlSink, NoContext, Published, ResultSink, StaticAssets, StaticContext};
use geowatch_core::{review_order, JsonlHistory, ThreatLevel, TimeRange};
use geowatch_engine::{
    forecast_assets, scan_anomalies, train_from_history, AssetOutcome, BatchRunner, EngineConfig, MockImagerySource,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geowatch")]
#[command(author, version, about = "Change detection and threat forecasting for monitored assets", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every asset of an asset file against mock imagery
    Analyze {
        /// Asset file (JSON array)
        assets: PathBuf,
        /// Observation history (JSON Lines), created if missing
        #[arg(long, default_value = "history.jsonl")]
        history: PathBuf,
        /// Append classifications and anomaly flags here (JSON Lines)
        #[arg(long)]
        results: Option<PathBuf>,
        /// OSM contexts keyed by asset id (JSON object)
        #[arg(long)]
        context: Option<PathBuf>,
        /// First acquisition date (YYYY-MM-DD)
        #[arg(long, default_value = "2024-01-01")]
        since: String,
        /// End of the acquisition window, exclusive (YYYY-MM-DD)
        #[arg(long, default_value = "2024-04-01")]
        until: String,
        /// Seed for the mock imagery
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Inject construction: ASSET_ID=YYYY-MM-DD (repeatable)
        #[arg(long = "construction")]
        construction: Vec<String>,
        /// Rows of the review list to print
        #[arg(long, default_value = "20")]
        top: usize,
    },
    /// Train a forecast model on the recorded history
    Train {
        /// Observation history (JSON Lines)
        #[arg(long, default_value = "history.jsonl")]
        history: PathBuf,
        /// Target: growth or threat_score
        #[arg(short, long, default_value = "growth")]
        target: String,
        /// Where to write the model (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Forecast every asset with a trained model
    Forecast {
        /// Model file written by `train`
        #[arg(short, long)]
        model: PathBuf,
        /// Observation history (JSON Lines)
        #[arg(long, default_value = "history.jsonl")]
        history: PathBuf,
        /// Number of growth hotspots to list
        #[arg(long, default_value = "10")]
        top: usize,
        /// Print forecasts as JSON Lines
        #[arg(long)]
        json: bool,
    },
    /// Scan the recorded history for anomalies
    Anomalies {
        /// Observation history (JSON Lines)
        #[arg(long, default_value = "history.jsonl")]
        history: PathBuf,
        /// Print flags as JSON Lines
        #[arg(long)]
        json: bool,
    },
    /// Show or check engine configuration
    Config {
        /// Print the built-in defaults as TOML
        #[arg(long)]
        defaults: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
            info!("Config: {}", path.display());
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn open_history(path: &Path) -> Result<JsonlHistory> {
    let pb = spinner("Loading history...")?;
    let history = JsonlHistory::open(path).with_context(|| format!("Failed to open history {}", path.display()))?;
    pb.finish_and_clear();
    Ok(history)
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {}", s))?;
    Ok(date.and_hms_opt(0, 0, 0).context("Invalid time")?.and_utc())
}

fn parse_construction(s: &str) -> Result<(String, DateTime<Utc>)> {
    let Some((id, date)) = s.split_once('=') else {
        bail!("Construction must be 'ASSET_ID=YYYY-MM-DD', got: {}", s);
    };
    Ok((id.trim().to_string(), parse_date(date.trim())?))
}

fn done(what: &str, elapsed: std::time::Duration) {
    info!("{} done in {:.2?}", what, elapsed);
}

/// Publishes to the collecting sink and, when configured, a JSON Lines file
struct Tee {
    collected: CollectingSink,
    file: Option<JsonlSink>,
}

impl ResultSink for Tee {
    fn publish(&self, item: Published) -> geowatch_core::Result<()> {
        if let Some(file) = &self.file {
            file.publish(item.clone())?;
        }
        self.collected.publish(item)
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn analyze(
    config: &EngineConfig,
    assets: &Path,
    history: &Path,
    results: Option<&Path>,
    context: Option<&Path>,
    range: TimeRange,
    seed: u64,
    construction: &[String],
    top: usize,
) -> Result<()> {
    let assets = StaticAssets(records::read_assets(assets)?);
    info!("Assets: {}", assets.0.len());

    let mut imagery = MockImagerySource::new(seed);
    for spec in construction {
        let (id, start) = parse_construction(spec)?;
        if !assets.0.iter().any(|a| a.id.as_str() == id) {
            warn!("construction target {} is not in the asset file", id);
        }
        imagery = imagery.with_construction(id, start);
    }

    let context: Box<dyn ContextSource> = match context {
        Some(path) => Box::new(StaticContext(records::read_contexts(path)?)),
        None => Box::new(NoContext),
    };
    let history = open_history(history)?;
    let sink = Tee {
        collected: CollectingSink::new(),
        file: results
            .map(JsonlSink::create)
            .transpose()
            .context("Failed to open results file")?,
    };

    let pb = progress_bar(assets.0.len())?;
    let start = Instant::now();
    let summary = BatchRunner::new(config, &imagery, context.as_ref(), &history, &sink)
        .context("Failed to start the batch runner")?
        .with_progress(|report| {
            pb.set_message(report.asset_id.to_string());
            pb.inc(1);
        })
        .run(&assets, range)
        .context("Batch run failed")?;
    pb.finish_and_clear();
    done("Analysis", start.elapsed());

    println!(
        "Assets: {} succeeded, {} degraded, {} skipped, {} cancelled",
        summary.succeeded(),
        summary.degraded(),
        summary.skipped(),
        summary.cancelled()
    );
    for report in &summary.reports {
        match &report.outcome {
            AssetOutcome::Degraded { reasons } => println!("  {} degraded: {}", report.asset_id, reasons.join("; ")),
            AssetOutcome::Skipped { reason } => println!("  {} skipped: {}", report.asset_id, reason),
            AssetOutcome::Succeeded | AssetOutcome::Cancelled => {}
        }
    }

    println!("\nBy category:");
    for (category, count) in &summary.category_counts {
        println!("  {:<15} {}", category.as_str(), count);
    }
    println!("Highest threat per asset:");
    for (level, count) in &summary.threat_counts {
        println!("  {:<15} {}", level.as_str(), count);
    }

    let mut review: Vec<_> = sink
        .collected
        .classifications()
        .into_iter()
        .filter(|c| c.threat_level > ThreatLevel::None)
        .collect();
    review_order(&mut review);
    if !review.is_empty() {
        println!("\nReview list:");
        for c in review.iter().take(top) {
            let factors: Vec<String> = c.rationale.iter().map(|f| f.to_string()).collect();
            println!(
                "  {:<9} {:<12} {}  score {:.3}  [{}]  {}",
                c.threat_level.as_str(),
                c.asset_id.as_str(),
                c.observed_at.format("%Y-%m-%d"),
                c.change_score.unwrap_or(0.0),
                c.zone,
                factors.join(", ")
            );
        }
    }

    let anomalies = sink.collected.anomalies();
    if !anomalies.is_empty() {
        println!("\nAnomalies:");
        for flag in &anomalies {
            println!("  {}", flag);
        }
    }
    Ok(())
}

fn train(config: &EngineConfig, history: &Path, target: &str, output: &Path) -> Result<()> {
    let target: ForecastTarget = target.parse()?;
    let history = open_history(history)?;
    let registry = ModelRegistry::new();

    let pb = spinner("Training...")?;
    let start = Instant::now();
    let report = train_from_history(&registry, target, &history, &config.forecast).context("Training failed")?;
    pb.finish_and_clear();
    done("Training", start.elapsed());

    report
        .model
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let model = &report.model;
    println!("Model: {} v{} -> {}", model.target, model.version, output.display());
    println!("  Samples: {} from {} assets", model.sample_count, model.asset_count);
    println!("  Trained on: {} .. {}", model.trained_from.format("%Y-%m-%d"), model.trained_to.format("%Y-%m-%d"));
    println!("  RMSE: {:.4}", model.rmse);
    if !report.skipped.is_empty() {
        println!("  Skipped {} assets with too little history", report.skipped.len());
    }
    Ok(())
}

fn forecast(config: &EngineConfig, model: &Path, history: &Path, top: usize, json: bool) -> Result<()> {
    let model = ForecastModel::load(model).with_context(|| format!("Failed to load model {}", model.display()))?;
    let target = model.target;
    let registry = ModelRegistry::new();
    let model = registry.publish(model);
    info!("Model: {} v{} ({} samples)", model.target, model.version, model.sample_count);

    let history = open_history(history)?;
    let run = forecast_assets(&registry, target, &history, &config.forecast).context("Forecast failed")?;

    if json {
        for f in &run.forecasts {
            println!("{}", serde_json::to_string(f)?);
        }
        return Ok(());
    }

    println!("Forecasts: {} assets, {} with too little history", run.forecasts.len(), run.insufficient.len());
    println!("\nGrowth hotspots:");
    for f in growth_hotspots(&run.forecasts, top) {
        let caveat = if f.is_extrapolation() {
            format!("  (extrapolated: {})", f.extrapolated.join(", "))
        } else {
            String::new()
        };
        println!(
            "  {:<12} {:.3} -> {:.3}  {:?}{}",
            f.asset_id.as_str(), f.last_value, f.predicted, f.trend, caveat
        );
    }
    Ok(())
}

fn anomalies(config: &EngineConfig, history: &Path, json: bool) -> Result<()> {
    let history = open_history(history)?;
    let flags = scan_anomalies(&history, &AnomalyDetector::new(config.anomaly.clone()))?;

    if json {
        for flag in &flags {
            println!("{}", serde_json::to_string(flag)?);
        }
    } else {
        println!("Anomalies: {}", flags.len());
        for flag in &flags {
            println!("  {}", flag);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            assets,
            history,
            results,
            context,
            since,
            until,
            seed,
            construction,
            top,
        } => {
            let range = TimeRange::new(parse_date(&since)?, parse_date(&until)?);
            if range.start >= range.end {
                bail!("--since must be before --until");
            }
            analyze(
                &config,
                &assets,
                &history,
                results.as_deref(),
                context.as_deref(),
                range,
                seed,
                &construction,
                top,
            )?;
        }

        Commands::Train {
            history,
            target,
            output,
        } => train(&config, &history, &target, &output)?,

        Commands::Forecast {
            model,
            history,
            top,
            json,
        } => forecast(&config, &model, &history, top, json)?,

        Commands::Anomalies { history, json } => anomalies(&config, &history, json)?,

        Commands::Config { defaults } => {
            if defaults || cli.config.is_none() {
                print!("{}", EngineConfig::default().to_toml()?);
            } else {
                print!("{}", config.to_toml()?);
                eprintln!("Configuration is valid");
            }
        }
    }

    Ok(())
}
