mod checkpoint;
mod cli;
mod config;
mod error;
mod excel;
mod logging;
mod models;
mod normalize;
mod ocr;
mod pairing;
mod preprocess;
mod progress;
mod sanitize;
mod services;
mod types;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub use checkpoint::{CheckpointLedger, DEFAULT_CHECKPOINT_FILE};
pub use cli::Cli;
pub use config::{Credentials, RunConfig};
pub use error::{ExportError, LedgerError, OcrError, RunError};
pub use excel::{cell_value, export_table, CellValue};
pub use models::{ColumnSpec, Schema, INVOICE_SCHEMA, LICENSE_SCHEMA, UNIT_COLUMN};
pub use normalize::{normalize, normalize_invoice, row_from_result, FieldLookup};
pub use ocr::{parse_response, BaiduOcr, MockOcr, OcrBackend};
pub use pairing::{FieldResolver, PositionalResolver, INLINE_VALUE_LABELS, NEXT_TOKEN_LABELS};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use progress::{ProgressEvent, ProgressObserver, RecordingObserver, TracingObserver};
pub use sanitize::clean;
pub use services::{BatchWalker, IMAGE_EXTENSIONS};
pub use types::{BatchOutcome, DocumentMode, LicenseField, OcrToken, RawFieldResult, ResultTable, Row};

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    Exported { path: PathBuf, rows: usize },
    NoData,
}

/// Walk the root, then export whatever was produced. Export is skipped when no rows came out.
pub fn execute(
    config: &RunConfig,
    ocr: &dyn OcrBackend,
    observer: &dyn ProgressObserver,
) -> Result<RunReport, RunError> {
    let output = config.resolve_output_path()?;
    let outcome = match BatchWalker::new(ocr, observer).run(config) {
        Err(RunError::Interrupted { source, partial }) => {
            // Recorded units are skipped next time, so their rows are saved now or never.
            if !partial.is_empty() {
                match export_table(&partial, &output) {
                    Ok(()) => tracing::warn!(
                        "Saved {} row(s) from recorded units to {} before stopping",
                        partial.rows.len(),
                        output.display()
                    ),
                    Err(e) => tracing::error!("Failed to save {} row(s) to {}: {}", partial.rows.len(), output.display(), e),
                }
            }
            return Err(RunError::Interrupted { source, partial });
        }
        other => other?,
    };
    match outcome {
        BatchOutcome::NoData => {
            tracing::warn!("No data found. Skip saving data to Excel file.");
            Ok(RunReport::NoData)
        }
        BatchOutcome::Table(table) => {
            if let Err(e) = export_table(&table, &output) {
                tracing::error!("Failed to save {} row(s) to {}: {}", table.rows.len(), output.display(), e);
                return Err(e.into());
            }
            Ok(RunReport::Exported { path: output, rows: table.rows.len() })
        }
    }
}

fn open_containing_folder(path: &Path) {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    if let Err(e) = opener::open(dir) {
        tracing::warn!("Could not open folder {}: {}", dir.display(), e);
    }
}

/// Command-line entry point.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log_file) {
        eprintln!("Could not open log file {}: {}", cli.log_file.display(), e);
        return ExitCode::FAILURE;
    }

    let credentials = match Credentials::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let ocr = match BaiduOcr::connect(&credentials, cli.timeout()) {
        Ok(ocr) => ocr,
        Err(e) => {
            tracing::error!("Unable to get access_token. Exiting the program: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = cli.run_config();
    tracing::info!("Selected directory: {} ({} mode)", config.root.display(), config.mode);
    match execute(&config, &ocr, &TracingObserver) {
        Ok(RunReport::Exported { path, rows }) => {
            println!("Excel 文件保存成功: {} ({} 行)", path.display(), rows);
            if cli.open_folder {
                open_containing_folder(&path);
            }
            ExitCode::SUCCESS
        }
        Ok(RunReport::NoData) => {
            println!("没有找到数据，Excel 文件未保存。");
            ExitCode::SUCCESS
        }
        Err(RunError::Export(e)) => {
            eprintln!("Excel 文件保存失败: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
