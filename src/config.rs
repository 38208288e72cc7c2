use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checkpoint::DEFAULT_CHECKPOINT_FILE;
use crate::error::RunError;
use crate::types::DocumentMode;

pub const API_KEY_VAR: &str = "BAIDU_OCR_API_KEY";
pub const SECRET_KEY_VAR: &str = "BAIDU_OCR_SECRET_KEY";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOG_FILE: &str = "output.log";

fn load_env() {
    let _ = dotenvy::dotenv();
}

/// API key pair for the OCR service.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"***").field("secret_key", &"***").finish()
    }
}

impl Credentials {
    /// Read the key pair from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, RunError> {
        load_env();
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| RunError::Config(format!("{name} not set in environment or .env")))
        };
        Ok(Self { api_key: read(API_KEY_VAR)?, secret_key: read(SECRET_KEY_VAR)? })
    }
}

/// Everything one batch run needs. Owned by the caller; nothing is global.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub mode: DocumentMode,
    pub checkpoint_path: PathBuf,
    /// Where the workbook goes; `None` means a timestamped file in Downloads.
    pub output_path: Option<PathBuf>,
    /// Pause after each OCR call.
    pub call_delay: Duration,
}

impl RunConfig {
    pub fn new(root: impl Into<PathBuf>, mode: DocumentMode) -> Self {
        Self {
            root: root.into(),
            mode,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            output_path: None,
            call_delay: Duration::ZERO,
        }
    }

    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Final export path: the configured one with `.xlsx` enforced, or a fresh default.
    pub fn resolve_output_path(&self) -> Result<PathBuf, RunError> {
        match self.output_path.as_deref().filter(|p| !p.as_os_str().is_empty()) {
            Some(p) => Ok(ensure_xlsx_extension(p)),
            None => {
                let dir = dirs::download_dir()
                    .or_else(dirs::desktop_dir)
                    .ok_or_else(|| RunError::Config("Could not find Downloads or Desktop folder.".to_string()))?;
                Ok(default_output_in(&dir, self.mode, chrono::Local::now().naive_local()))
            }
        }
    }
}

/// Append `.xlsx` unless the path already ends with it.
pub fn ensure_xlsx_extension(path: &Path) -> PathBuf {
    let has_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if has_xlsx {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_owned();
        s.push(".xlsx");
        PathBuf::from(s)
    }
}

/// `<mode>_YYYYmmdd_HHMMSS.xlsx` in `dir`, with a `_N` suffix if that name is taken.
pub fn default_output_in(dir: &Path, mode: DocumentMode, now: chrono::NaiveDateTime) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let mut p = dir.join(format!("{mode}_{stamp}.xlsx"));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!("{mode}_{stamp}_{counter}.xlsx"));
        counter += 1;
    }
    p
}
