//! # Classify one item and print its segments
//! bandwatch classify --item 4151 --data-dir data
//!
//! # Reclassify every item with stored history
//! bandwatch recalculate --data-dir data --output segments.json
//!
//! # Suggest thresholds from the stored histories
//! bandwatch calibrate --data-dir data --window-size 24
//!
//! # Replay one item through the streaming classifier
//! bandwatch replay --item 4151 --data-dir data

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use bandwatch::data::{
    InMemoryItemStore, InMemorySegmentStore, InMemoryThresholdStore, ItemStore,
    PriceHistoryLoader, PricePoint, SegmentStore, ThresholdConfig, ThresholdUpdate,
};
use bandwatch::regime::{
    auto_calibrate_thresholds, init_stream_state, update_stream, DistributionStats, RegimeSegment,
};
use bandwatch::service::ClassificationService;

#[derive(Parser)]
#[command(name = "bandwatch")]
#[command(about = "Price-regime classification for item price histories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory containing prices/<item_id>.parquet files
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single item's price history and print its segments
    Classify {
        /// Item id to classify
        #[arg(long)]
        item: i64,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Write the computed segments to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Reclassify every item with stored price history
    Recalculate {
        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Write all computed segments to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Suggest thresholds from the feature distributions of stored histories
    Calibrate {
        /// Rolling window size to analyze with
        #[arg(long, default_value_t = 24)]
        window_size: usize,
    },

    /// Replay one item's history through the streaming classifier
    Replay {
        /// Item id to replay
        #[arg(long)]
        item: i64,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
}

/// Optional overrides merged into the default threshold configuration.
#[derive(Args)]
struct ThresholdArgs {
    /// Maximum chop ratio for RANGE_BOUND
    #[arg(long)]
    chop_max: Option<f64>,

    /// Maximum normalized range for RANGE_BOUND
    #[arg(long)]
    range_norm_max: Option<f64>,

    /// Maximum normalized slope for RANGE_BOUND
    #[arg(long)]
    slope_norm_max: Option<f64>,

    /// Minimum mean-crossing rate for RANGE_BOUND
    #[arg(long)]
    cross_rate_min: Option<f64>,

    /// Classification window size
    #[arg(long)]
    window_size: Option<usize>,
}

impl ThresholdArgs {
    fn to_update(&self) -> ThresholdUpdate {
        ThresholdUpdate {
            chop_max: self.chop_max,
            range_norm_max: self.range_norm_max,
            slope_norm_max: self.slope_norm_max,
            cross_rate_min: self.cross_rate_min,
            window_size: self.window_size,
        }
    }
}

type CliService =
    ClassificationService<InMemoryThresholdStore, InMemorySegmentStore, InMemoryItemStore>;

/// Build a service over seeded in-memory stores, with CLI overrides applied.
fn build_service(thresholds: &ThresholdArgs) -> Result<CliService> {
    let mut service = ClassificationService::new(
        InMemoryThresholdStore::seeded(),
        InMemorySegmentStore::new(),
        InMemoryItemStore::new(),
    );

    let update = thresholds.to_update();
    if !update.is_empty() {
        if let Err(errors) = update.validate() {
            bail!("invalid threshold overrides:\n  {}", errors.join("\n  "));
        }
        service.update_thresholds(&update)?;
    }

    Ok(service)
}

fn print_segments(segments: &[RegimeSegment]) {
    println!(
        "{:<12} {:<7} {:<7} {:<20} {:<20} {:>10} {:>9} {:>6} {:>5}",
        "label", "start", "end", "start_ts", "end_ts", "midpoint", "width%", "conf", "dir"
    );
    for segment in segments {
        println!(
            "{:<12} {:<7} {:<7} {:<20} {:<20} {:>10} {:>9} {:>6} {:>5}",
            segment.label.as_str(),
            segment.start_idx,
            segment.end_idx,
            segment.start_ts.format("%Y-%m-%d %H:%M"),
            segment.end_ts.format("%Y-%m-%d %H:%M"),
            segment
                .band_midpoint
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "-".to_string()),
            segment
                .band_width_pct
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string()),
            segment
                .confidence_score
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string()),
            segment.slope_direction,
        );
    }
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_classify(
    data_dir: &PathBuf,
    item: i64,
    thresholds: &ThresholdArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let loader = PriceHistoryLoader::new(&data_dir.to_string_lossy());
    let prices = loader
        .load_history(item)
        .with_context(|| format!("loading price history for item {}", item))?;

    let mut service = build_service(thresholds)?;
    let segments = service.classify_item(item, &prices)?;
    service.save_segments(item, &segments)?;

    println!(
        "Item {}: {} prices, {} segments\n",
        item,
        prices.len(),
        segments.len()
    );
    print_segments(&segments);

    if let Some(regime) = service.item_store().current_regime(item)? {
        println!("\nCurrent regime: {}", regime.as_str());
    }

    if let Some(path) = output {
        write_json(&path, &segments)?;
    }

    Ok(())
}

fn cmd_recalculate(
    data_dir: &PathBuf,
    thresholds: &ThresholdArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let loader = PriceHistoryLoader::new(&data_dir.to_string_lossy());
    let items = loader.available_items()?;
    if items.is_empty() {
        bail!("no price histories found under {}/prices", data_dir.display());
    }

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message("loading histories");

    let mut histories: Vec<(i64, Vec<PricePoint>)> = Vec::with_capacity(items.len());
    for item_id in items {
        match loader.load_history(item_id) {
            Ok(points) => histories.push((item_id, points)),
            Err(e) => {
                // One unreadable history must not block the rest.
                warn!("skipping item {}: {}", item_id, e);
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("histories loaded");

    let mut service = build_service(thresholds)?;
    let summary = service.recalculate(&histories)?;

    println!("\nRecalculation complete");
    println!("  Items processed: {}", summary.items_processed);
    println!("  Segments created: {}", summary.segments_created);
    println!("  Items skipped (too short): {}", summary.items_skipped);
    println!("  Failures: {}", summary.failures.len());
    for failure in &summary.failures {
        println!("    item {}: {}", failure.item_id, failure.error);
    }

    if let Some(path) = output {
        let mut all: Vec<(i64, Vec<RegimeSegment>)> = Vec::new();
        for item_id in service.segment_store().item_ids() {
            all.push((item_id, service.segment_store().query_by_item(item_id, None)?));
        }
        write_json(&path, &all)?;
    }

    Ok(())
}

fn print_stats(name: &str, stats: &DistributionStats) {
    println!(
        "  {:<12} min {:>10.6}  p25 {:>10.6}  p50 {:>10.6}  p75 {:>10.6}  max {:>10.6}",
        name, stats.min, stats.p25, stats.p50, stats.p75, stats.max
    );
}

fn cmd_calibrate(data_dir: &PathBuf, window_size: usize) -> Result<()> {
    if window_size < 2 {
        bail!("window_size must be at least 2");
    }

    let loader = PriceHistoryLoader::new(&data_dir.to_string_lossy());
    let all = loader.load_all_price_values()?;
    if all.is_empty() {
        bail!("no price histories found under {}/prices", data_dir.display());
    }

    let series: Vec<Vec<f64>> = all.into_iter().map(|(_, values)| values).collect();
    let suggested = auto_calibrate_thresholds(&series, window_size);

    println!(
        "Analyzed {} windows across {} series (window size {})\n",
        suggested.window_count,
        series.len(),
        window_size
    );
    println!("Feature distributions:");
    print_stats("chop", &suggested.chop_stats);
    print_stats("range_norm", &suggested.range_norm_stats);
    print_stats("slope_norm", &suggested.slope_norm_stats);
    print_stats("cross_rate", &suggested.cross_rate_stats);

    println!("\nSuggested thresholds:");
    println!("  chop_max       = {:.6}", suggested.chop_max);
    println!("  range_norm_max = {:.6}", suggested.range_norm_max);
    println!("  slope_norm_max = {:.6}", suggested.slope_norm_max);
    println!("  cross_rate_min = {:.6}", suggested.cross_rate_min);

    Ok(())
}

fn cmd_replay(data_dir: &PathBuf, item: i64, thresholds: &ThresholdArgs) -> Result<()> {
    let update = thresholds.to_update();
    if let Err(errors) = update.validate() {
        bail!("invalid threshold overrides:\n  {}", errors.join("\n  "));
    }

    let mut config = ThresholdConfig::default();
    update.apply(&mut config);

    let loader = PriceHistoryLoader::new(&data_dir.to_string_lossy());
    let prices = loader
        .load_history(item)
        .with_context(|| format!("loading price history for item {}", item))?;

    let mut state = init_stream_state(config.window_size, config.thresholds());
    let mut emitted = Vec::new();

    for point in &prices {
        let result = update_stream(&state, *point);
        state = result.state;
        if let Some(segment) = result.segment {
            println!(
                "[{}] {} closed: points {}..{} ({:.0}% conf)",
                segment.end_ts.format("%Y-%m-%d %H:%M"),
                segment.label.as_str(),
                segment.start_idx,
                segment.end_idx,
                segment.confidence_score.unwrap_or(0.0) * 100.0
            );
            emitted.push(segment);
        }
    }

    println!(
        "\nReplayed {} points: {} completed segments",
        prices.len(),
        emitted.len()
    );
    if let Some(label) = state.current_label {
        println!(
            "Open segment: {} since point {}",
            label.as_str(),
            state.segment_start_idx.unwrap_or(0)
        );
    } else {
        println!("Never saw a full window (history shorter than window size)");
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            item,
            thresholds,
            output,
        } => cmd_classify(&cli.data_dir, item, &thresholds, output),
        Commands::Recalculate { thresholds, output } => {
            cmd_recalculate(&cli.data_dir, &thresholds, output)
        }
        Commands::Calibrate { window_size } => cmd_calibrate(&cli.data_dir, window_size),
        Commands::Replay { item, thresholds } => cmd_replay(&cli.data_dir, item, &thresholds),
    }
}
