use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint::DEFAULT_CHECKPOINT_FILE;
use crate::config::{RunConfig, DEFAULT_LOG_FILE, DEFAULT_TIMEOUT_SECS};
use crate::types::DocumentMode;

#[derive(Parser, Debug)]
#[command(name = "vehicle-scanner")]
#[command(about = "Extract vehicle license / sales invoice fields from photo folders into Excel")]
#[command(version)]
pub struct Cli {
    /// Folder whose subfolders each hold one vehicle's photos
    pub root: PathBuf,

    /// Document type in the photos
    #[arg(long, value_enum, default_value_t = DocumentMode::License)]
    pub mode: DocumentMode,

    /// Excel file to write (".xlsx" is appended if missing); defaults to Downloads
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// File recording completed subfolders
    #[arg(long, default_value = DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint: PathBuf,

    /// Pause after each OCR call, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// HTTP timeout per OCR request, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Append-only log file
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Open the folder containing the Excel file after saving
    #[arg(long)]
    pub open_folder: bool,
}

impl Cli {
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.root, self.mode)
            .with_checkpoint(&self.checkpoint)
            .with_call_delay(Duration::from_millis(self.delay_ms));
        if let Some(output) = &self.output {
            config = config.with_output(output);
        }
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
