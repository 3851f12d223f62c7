mod bootstrap;

use anyhow::{Context, Result};
use eda_core::settings::Settings;
use eda_data::analysis::{run_analysis, AnalysisOptions, AnalysisResult};

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("whatsapp-eda v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {}, output: {}, batch size: {}, timezone: {}",
        settings.input.display(),
        settings.output_dir.display(),
        settings.batch_size,
        settings.timezone
    );

    let options = AnalysisOptions::try_from(&settings)?;

    match run_analysis(&options) {
        Ok(result) => {
            print_report(&result);
            Ok(())
        }
        Err(err) => {
            let stage = err.stage();
            tracing::error!("{} stage failed: {}", stage, err);
            Err(err).with_context(|| format!("{} stage failed", stage))
        }
    }
}

/// Print the headline figures and where the tables went.
fn print_report(result: &AnalysisResult) {
    let insights = &result.metadata.insights;
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());

    println!("Events analysed:   {}", insights.total_events);
    println!(
        "Distinct users:    {}  groups: {}  images: {}",
        insights.distinct_users, insights.distinct_groups, insights.distinct_images
    );
    println!("Peak weekday:      {}", or_dash(insights.peak_weekday.clone()));
    println!(
        "Most active hour:  {}",
        or_dash(insights.peak_hour.map(|h| format!("{:02}:00", h)))
    );
    println!("Busiest date:      {}", or_dash(insights.busiest_date.clone()));
    println!("Top shared image:  {}", or_dash(insights.top_image.clone()));
    if let Some(copied) = result.metadata.images_copied {
        println!("Top images copied: {}", copied);
    }
    println!(
        "Wrote {} files to {}",
        result.written.len(),
        result.metadata.output_dir
    );
}
