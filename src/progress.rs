use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

/// Status updates a batch run emits, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted { root: PathBuf, units: usize, already_complete: usize },
    UnitSkipped { unit: String },
    UnitStarted { unit: String, images: usize },
    ImageProcessed { unit: String, image: PathBuf },
    ImageFailed { unit: String, image: PathBuf, error: String },
    UnitCompleted { unit: String, rows: usize },
    UnitAborted { unit: String, error: String },
    RunFinished { processed_units: usize, rows: usize },
}

/// Sink for progress events. The batch walker knows nothing else about the caller's UI.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

/// Writes every event to the tracing log (and so to the log file).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn notify(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { root, units, already_complete } => tracing::info!(
                "Scanning {}: {} unit(s), {} already complete",
                root.display(),
                units,
                already_complete
            ),
            ProgressEvent::UnitSkipped { unit } => {
                tracing::info!("Skipping already processed directory {}", unit)
            }
            ProgressEvent::UnitStarted { unit, images } => {
                tracing::info!("Processing directory {} ({} image(s))", unit, images)
            }
            ProgressEvent::ImageProcessed { image, .. } => {
                tracing::info!("Processed image: {}", image.display())
            }
            ProgressEvent::ImageFailed { image, error, .. } => {
                tracing::warn!("Failed to process image {}: {}", image.display(), error)
            }
            ProgressEvent::UnitCompleted { unit, rows } => {
                tracing::info!("Finished directory {} ({} row(s))", unit, rows)
            }
            ProgressEvent::UnitAborted { unit, error } => {
                tracing::warn!("Directory {} not completed, will retry next run: {}", unit, error)
            }
            ProgressEvent::RunFinished { processed_units, rows } => {
                tracing::info!("Run finished: {} unit(s) processed, {} row(s)", processed_units, rows)
            }
        }
    }
}

/// Keeps every event in memory; handy for tests and for callers that render their own log.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressObserver for RecordingObserver {
    fn notify(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fan an event out to several observers.
impl<A: ProgressObserver, B: ProgressObserver> ProgressObserver for (A, B) {
    fn notify(&self, event: &ProgressEvent) {
        self.0.notify(event);
        self.1.notify(event);
    }
}
