use clap::Parser;
use std::path::PathBuf;

use crate::error::{EdaError, Result};
use crate::time_utils::TimezoneHandler;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Exploratory analysis of WhatsApp image-sharing logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "whatsapp-eda",
    about = "Exploratory analysis of WhatsApp image-sharing logs",
    version
)]
pub struct Settings {
    /// Tab-separated event log to analyse
    #[arg(env = "WHATSAPP_EDA_INPUT")]
    pub input: PathBuf,

    /// Directory the aggregate tables are written to
    #[arg(long, default_value = "analysis_outputs", env = "WHATSAPP_EDA_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Rows read per batch while loading
    #[arg(long, default_value = "5000", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Number of users in the top-users table
    #[arg(long, default_value = "10")]
    pub top_users: usize,

    /// Number of groups in the top-groups table
    #[arg(long, default_value = "10")]
    pub top_groups: usize,

    /// Number of images in the top-images table
    #[arg(long, default_value = "20")]
    pub top_images: usize,

    /// Number of top images tracked in the spread trend
    #[arg(long, default_value = "5")]
    pub spread_images: usize,

    /// IANA timezone used to derive hours, weekdays and dates
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Directory holding the shared image files; top images are copied out of it
    #[arg(long)]
    pub image_dir: Option<PathBuf>,

    /// Do not write the cleaned event table
    #[arg(long)]
    pub skip_clean_export: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse CLI arguments and validate the result.
    pub fn load() -> Result<Self> {
        Self::load_from(std::env::args_os())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    ///
    /// Argument errors (unknown flags, `--help`) exit the process the way clap
    /// always does; semantic errors are returned.
    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Check values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if !TimezoneHandler::validate_timezone(&self.timezone) {
            return Err(EdaError::Config(format!(
                "unknown timezone {}",
                self.timezone
            )));
        }
        Ok(())
    }

    /// Timezone handler for the configured zone.
    pub fn timezone_handler(&self) -> Result<TimezoneHandler> {
        TimezoneHandler::new(&self.timezone)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
