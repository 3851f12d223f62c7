//! Main analysis pipeline.
//!
//! Runs load → normalize → aggregate → persist (→ collect images) as explicit
//! stages over explicit inputs, returning an [`AnalysisResult`] and leaving
//! every aggregate on disk for the plotting and viewer collaborators.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use eda_core::error::{EdaError, Result};
use eda_core::settings::Settings;
use eda_core::time_utils::TimezoneHandler;
use serde::{Deserialize, Serialize};
use eda_core::models::REQUIRED_COLUMNS;
use tracing::{debug, info};

use crate::aggregator::{AggregateLimits, AggregateSet, InsightSummary};
use crate::images::{collect_top_images, TOP_IMAGES_DIR};
use crate::normalizer::normalize;
use crate::reader::{load_batches, DEFAULT_BATCH_SIZE};
use crate::writer::{persist_aggregates, CleanEvents, OutputDir, CLEAN_EXPORT_NAME};

/// File name (without extension) of the run summary.
pub const SUMMARY_NAME: &str = "summary";

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub batch_size: usize,
    pub limits: AggregateLimits,
    pub timezone: TimezoneHandler,
    /// Folder of image files to copy the top images from.
    pub image_dir: Option<PathBuf>,
    /// Write the cleaned event table alongside the aggregates.
    pub clean_export: bool,
}

impl AnalysisOptions {
    /// Options with default cutoffs, UTC, and the cleaned export enabled.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            limits: AggregateLimits::default(),
            timezone: TimezoneHandler::utc(),
            image_dir: None,
            clean_export: true,
        }
    }
}

impl TryFrom<&Settings> for AnalysisOptions {
    type Error = EdaError;

    fn try_from(settings: &Settings) -> Result<Self> {
        Ok(Self {
            input: settings.input.clone(),
            output_dir: settings.output_dir.clone(),
            batch_size: usize::try_from(settings.batch_size).unwrap_or(usize::MAX),
            limits: AggregateLimits {
                top_users: settings.top_users,
                top_groups: settings.top_groups,
                top_images: settings.top_images,
                spread_images: settings.spread_images,
            },
            timezone: settings.timezone_handler()?,
            image_dir: settings.image_dir.clone(),
            clean_export: !settings.skip_clean_export,
        })
    }
}

/// Metadata produced alongside the aggregates and persisted as `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub input: String,
    pub output_dir: String,
    /// IANA name of the timezone calendar fields were derived in.
    pub timezone: String,
    pub batch_size: usize,
    pub rows_loaded: usize,
    pub batches_read: usize,
    /// Number of top images copied, or `None` when no image folder was given.
    pub images_copied: Option<usize>,
    pub limits: AggregateLimits,
    pub insights: InsightSummary,
    pub load_time_seconds: f64,
    pub normalize_time_seconds: f64,
    pub aggregate_time_seconds: f64,
    pub persist_time_seconds: f64,
}

/// The complete output of [`run_analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub aggregates: AggregateSet,
    pub metadata: AnalysisMetadata,
    /// Every file written, in write order; the summary comes last.
    pub written: Vec<PathBuf>,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full pipeline.
///
/// 1. Load the event table in batches.
/// 2. Resolve timestamps to calendar instants.
/// 3. Build every aggregate view.
/// 4. Write the aggregates (and the cleaned table) to the output directory.
/// 5. Copy the top images when an image folder is configured.
/// 6. Write `summary.json`.
///
/// The first failing stage aborts the run.
pub fn run_analysis(options: &AnalysisOptions) -> Result<AnalysisResult> {
    // ── Step 1: Load ──────────────────────────────────────────────────────────
    let load_start = Instant::now();
    let loaded = load_batches(&options.input, &REQUIRED_COLUMNS, options.batch_size)?;
    let rows_loaded = loaded.table.len();
    let batches_read = loaded.batches;
    let load_time = load_start.elapsed().as_secs_f64();
    info!(
        "Loaded {} rows in {} batches from {}",
        rows_loaded,
        batches_read,
        options.input.display()
    );

    // ── Step 2: Normalize ─────────────────────────────────────────────────────
    let normalize_start = Instant::now();
    let events = normalize(loaded.table, &options.timezone)?;
    let normalize_time = normalize_start.elapsed().as_secs_f64();

    // ── Step 3: Aggregate ─────────────────────────────────────────────────────
    let aggregate_start = Instant::now();
    if options.limits.top_images < options.limits.spread_images {
        debug!(
            "Spread trend limited to the {} top images",
            options.limits.top_images
        );
    }
    let aggregates = AggregateSet::build(&events, options.limits);
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();
    info!(
        "Aggregated {} users, {} groups, {} images",
        aggregates.insights.distinct_users,
        aggregates.insights.distinct_groups,
        aggregates.insights.distinct_images
    );

    // ── Step 4: Persist ───────────────────────────────────────────────────────
    let persist_start = Instant::now();
    let out = OutputDir::ensure(&options.output_dir)?;
    let mut written = Vec::new();
    if options.clean_export {
        written.push(out.write_table(CLEAN_EXPORT_NAME, &CleanEvents(&events))?);
    }
    written.extend(persist_aggregates(&out, &aggregates)?);

    // ── Step 5: Top images ────────────────────────────────────────────────────
    let images_copied = match &options.image_dir {
        Some(image_dir) => {
            let dest = out.subdir(TOP_IMAGES_DIR)?;
            let names = aggregates.top_images.keys(options.limits.top_images);
            let copied = collect_top_images(image_dir, &names, &dest)?;
            info!("Copied {} top images into {}", copied, dest.path().display());
            Some(copied)
        }
        None => None,
    };
    let persist_time = persist_start.elapsed().as_secs_f64();

    // ── Step 6: Summary ───────────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        input: options.input.display().to_string(),
        output_dir: out.path().display().to_string(),
        timezone: options.timezone.name().to_string(),
        batch_size: options.batch_size,
        rows_loaded,
        batches_read,
        images_copied,
        limits: options.limits,
        insights: aggregates.insights.clone(),
        load_time_seconds: load_time,
        normalize_time_seconds: normalize_time,
        aggregate_time_seconds: aggregate_time,
        persist_time_seconds: persist_time,
    };
    written.push(out.write_json(SUMMARY_NAME, &metadata)?);

    info!(
        "Wrote {} files to {}",
        written.len(),
        out.path().display()
    );

    Ok(AnalysisResult {
        aggregates,
        metadata,
        written,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
