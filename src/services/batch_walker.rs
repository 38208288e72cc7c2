//! Sequential, resumable walk over `<root>/<unit>/<image>`.
//!
//! Units are subdirectories of the root, visited in name order. A unit is
//! recorded in the checkpoint ledger only after every image in it has been
//! through OCR, and its rows join the result table only at that point, so an
//! interrupted unit leaves nothing behind and is redone from its first image
//! on the next run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::CheckpointLedger;
use crate::config::RunConfig;
use crate::error::{OcrError, RunError};
use crate::models::Schema;
use crate::normalize::row_from_result;
use crate::ocr::OcrBackend;
use crate::pairing::{FieldResolver, PositionalResolver};
use crate::preprocess::prepare_for_ocr;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::sanitize;
use crate::types::{BatchOutcome, ResultTable, Row};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct BatchWalker<'a> {
    ocr: &'a dyn OcrBackend,
    observer: &'a dyn ProgressObserver,
    resolver: Box<dyn FieldResolver + 'a>,
}

impl<'a> BatchWalker<'a> {
    pub fn new(ocr: &'a dyn OcrBackend, observer: &'a dyn ProgressObserver) -> Self {
        Self { ocr, observer, resolver: Box::new(PositionalResolver::default()) }
    }

    /// Swap the invoice label/value pairing strategy.
    pub fn with_resolver(mut self, resolver: impl FieldResolver + 'a) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Process every unit not yet in the ledger and return the accumulated rows.
    pub fn run(&self, config: &RunConfig) -> Result<BatchOutcome, RunError> {
        let mut ledger = CheckpointLedger::load(&config.checkpoint_path)?;
        let units = list_units(&config.root)?;
        let schema = config.mode.schema();

        let already_complete = units.iter().filter(|(name, _)| ledger.is_complete(name)).count();
        self.observer.notify(&ProgressEvent::RunStarted {
            root: config.root.clone(),
            units: units.len(),
            already_complete,
        });

        let mut table = ResultTable::new(schema);
        let mut processed_units = 0usize;
        for (name, path) in &units {
            if ledger.is_complete(name) {
                self.observer.notify(&ProgressEvent::UnitSkipped { unit: name.clone() });
                continue;
            }
            match self.process_unit(config, schema, name, path) {
                Ok(rows) => {
                    if let Err(source) = ledger.mark_complete(name) {
                        self.observer.notify(&ProgressEvent::UnitAborted { unit: name.clone(), error: source.to_string() });
                        return Err(RunError::Interrupted { source, partial: table });
                    }
                    processed_units += 1;
                    self.observer.notify(&ProgressEvent::UnitCompleted { unit: name.clone(), rows: rows.len() });
                    table.rows.extend(rows);
                }
                Err(e) => {
                    self.observer.notify(&ProgressEvent::UnitAborted { unit: name.clone(), error: e.to_string() });
                }
            }
        }

        self.observer.notify(&ProgressEvent::RunFinished { processed_units, rows: table.rows.len() });
        if table.is_empty() {
            Ok(BatchOutcome::NoData)
        } else {
            Ok(BatchOutcome::Table(table))
        }
    }

    /// All rows of one unit. Only a failure to list the unit itself is an error.
    fn process_unit(
        &self,
        config: &RunConfig,
        schema: &Schema,
        unit: &str,
        dir: &Path,
    ) -> std::io::Result<Vec<Row>> {
        let images = list_images(dir)?;
        self.observer.notify(&ProgressEvent::UnitStarted { unit: unit.to_string(), images: images.len() });

        let mut rows = Vec::with_capacity(images.len());
        for image in images {
            tracing::debug!("Processing image: {}", image.display());
            let row = match self.recognize_image(config, schema, unit, &image) {
                Ok(row) => {
                    self.observer.notify(&ProgressEvent::ImageProcessed { unit: unit.to_string(), image });
                    row
                }
                Err(e) => {
                    self.observer.notify(&ProgressEvent::ImageFailed {
                        unit: unit.to_string(),
                        image,
                        error: e.to_string(),
                    });
                    let mut row = Row::empty(schema, unit);
                    sanitize::clean_row(row.cells_mut());
                    row
                }
            };
            rows.push(row);
        }
        Ok(rows)
    }

    fn recognize_image(&self, config: &RunConfig, schema: &Schema, unit: &str, image: &Path) -> Result<Row, OcrError> {
        let bytes = fs::read(image).map_err(|source| OcrError::Io { path: image.to_path_buf(), source })?;
        let upload = prepare_for_ocr(config.mode, bytes)?;
        let result = self.ocr.recognize(config.mode, &upload);
        // Self-imposed rate limit, applied whether or not the call succeeded.
        if !config.call_delay.is_zero() {
            std::thread::sleep(config.call_delay);
        }
        result.map(|raw| row_from_result(&raw, self.resolver.as_ref(), schema, unit))
    }
}

/// Immediate subdirectories of `root` as (name, path), sorted by name.
pub fn list_units(root: &Path) -> Result<Vec<(String, PathBuf)>, RunError> {
    let err = |source| RunError::RootUnreadable { path: root.to_path_buf(), source };
    let mut units = Vec::new();
    for entry in fs::read_dir(root).map_err(err)? {
        let entry = entry.map_err(err)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => units.push((name, path)),
            Err(raw) => tracing::warn!("Skipping directory with non UTF-8 name: {:?}", raw),
        }
    }
    units.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(units)
}

/// Image files directly inside `dir`, sorted by name.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LICENSE_SCHEMA;
    use crate::ocr::MockOcr;
    use crate::progress::RecordingObserver;
    use crate::types::{DocumentMode, LicenseField, RawFieldResult};
    use std::collections::HashMap;

    /// Mock OCR that treats the image bytes as the plate number.
    fn plate_ocr() -> MockOcr<impl Fn(DocumentMode, &[u8]) -> Result<RawFieldResult, OcrError> + Send + Sync> {
        MockOcr::new(|_: DocumentMode, bytes: &[u8]| {
            let text = String::from_utf8_lossy(bytes).to_string();
            if text == "bad" {
                return Err(OcrError::Service { code: 216201, message: "image format error".into() });
            }
            let mut map = HashMap::new();
            map.insert("号牌号码".to_string(), LicenseField { words: text });
            Ok(RawFieldResult::License(map))
        })
    }

    fn fixture(units: &[(&str, &[(&str, &str)])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (unit, files) in units {
            let unit_dir = dir.path().join("root").join(unit);
            fs::create_dir_all(&unit_dir).unwrap();
            for (name, content) in *files {
                fs::write(unit_dir.join(name), content).unwrap();
            }
        }
        fs::create_dir_all(dir.path().join("root")).unwrap();
        dir
    }

    fn config(dir: &tempfile::TempDir) -> RunConfig {
        RunConfig::new(dir.path().join("root"), DocumentMode::License)
            .with_checkpoint(dir.path().join("checkpoint.csv"))
    }

    fn table(outcome: BatchOutcome) -> ResultTable {
        match outcome {
            BatchOutcome::Table(t) => t,
            BatchOutcome::NoData => panic!("expected rows"),
        }
    }

    #[test]
    fn processes_only_incomplete_units() {
        let dir = fixture(&[("a", &[("1.jpg", "A1")]), ("b", &[("1.jpg", "B1"), ("2.png", "B2")])]);
        fs::write(dir.path().join("checkpoint.csv"), "a\n").unwrap();
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();

        let t = table(BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap());

        assert_eq!(ocr.calls(), 2);
        assert_eq!(t.rows.len(), 2);
        assert!(t.rows.iter().all(|r| r.unit() == "b"));
        let ledger = CheckpointLedger::load(dir.path().join("checkpoint.csv")).unwrap();
        assert!(ledger.is_complete("a") && ledger.is_complete("b"));
        assert!(obs.events().contains(&ProgressEvent::UnitSkipped { unit: "a".into() }));
    }

    #[test]
    fn failed_image_gives_empty_row_and_unit_still_completes() {
        let dir = fixture(&[("car", &[("1.jpg", "bad"), ("2.jpg", "粤B1")])]);
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();

        let t = table(BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap());

        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0], Row::empty(&LICENSE_SCHEMA, "car"));
        assert_eq!(t.rows[1].get(&LICENSE_SCHEMA, "号牌号码"), Some("粤B1"));
        assert!(obs.events().iter().any(|e| matches!(e, ProgressEvent::ImageFailed { .. })));
        assert_eq!(fs::read_to_string(dir.path().join("checkpoint.csv")).unwrap(), "car\n");
    }

    #[test]
    fn only_image_extensions_case_insensitive() {
        let dir = fixture(&[("u", &[("a.JPG", "1"), ("b.Jpeg", "2"), ("c.PNG", "3"), ("notes.txt", "x"), ("d.gif", "y")])]);
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();
        let t = table(BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap());
        assert_eq!(ocr.calls(), 3);
        let plates: Vec<_> = t.rows.iter().map(|r| r.get(&LICENSE_SCHEMA, "号牌号码").unwrap()).collect();
        assert_eq!(plates, vec!["1", "2", "3"]);
    }

    #[test]
    fn units_visited_in_name_order_and_files_at_root_ignored() {
        let dir = fixture(&[("c", &[("1.jpg", "C")]), ("a", &[("1.jpg", "A")]), ("b", &[])]);
        fs::write(dir.path().join("root").join("stray.jpg"), "S").unwrap();
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();
        BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap();

        let started: Vec<_> = obs
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::UnitStarted { unit, .. } => Some(unit),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["a", "b", "c"]);
        // An image-less unit is still recorded.
        assert_eq!(fs::read_to_string(dir.path().join("checkpoint.csv")).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn all_complete_is_no_data_without_ocr() {
        let dir = fixture(&[("a", &[("1.jpg", "A")]), ("b", &[("1.jpg", "B")])]);
        fs::write(dir.path().join("checkpoint.csv"), "a\nb\nb\n").unwrap();
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();
        let outcome = BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap();
        assert!(matches!(outcome, BatchOutcome::NoData));
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig::new(dir.path().join("nope"), DocumentMode::License)
            .with_checkpoint(dir.path().join("checkpoint.csv"));
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();
        let err = BatchWalker::new(&ocr, &obs).run(&cfg).unwrap_err();
        assert!(matches!(err, RunError::RootUnreadable { .. }));
    }

    #[test]
    fn unusable_checkpoint_store_is_fatal() {
        let dir = fixture(&[("a", &[("1.jpg", "A")])]);
        fs::create_dir(dir.path().join("checkpoint.csv")).unwrap();
        let ocr = plate_ocr();
        let obs = RecordingObserver::default();
        let err = BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap_err();
        assert!(matches!(err, RunError::Ledger(_)));
        assert_eq!(ocr.calls(), 0);
    }

    /// Replaces the checkpoint file with a directory once `after` is recorded.
    struct BreakStoreAfter {
        after: &'static str,
        store: PathBuf,
    }

    impl ProgressObserver for BreakStoreAfter {
        fn notify(&self, event: &ProgressEvent) {
            if matches!(event, ProgressEvent::UnitCompleted { unit, .. } if unit == self.after) {
                fs::remove_file(&self.store).unwrap();
                fs::create_dir(&self.store).unwrap();
            }
        }
    }

    #[test]
    fn ledger_failure_mid_run_keeps_recorded_rows() {
        let dir = fixture(&[("a", &[("1.jpg", "A1"), ("2.jpg", "A2")]), ("b", &[("1.jpg", "B1")]), ("c", &[("1.jpg", "C1")])]);
        let ocr = plate_ocr();
        let obs = BreakStoreAfter { after: "a", store: dir.path().join("checkpoint.csv") };

        let err = BatchWalker::new(&ocr, &obs).run(&config(&dir)).unwrap_err();

        let RunError::Interrupted { partial, .. } = err else { panic!("expected interrupted run") };
        let units: Vec<_> = partial.rows.iter().map(|r| r.unit()).collect();
        assert_eq!(units, vec!["a", "a"]);
        assert_eq!(partial.rows[1].get(&LICENSE_SCHEMA, "号牌号码"), Some("A2"));
        // Stops at the unit it could not record.
        assert_eq!(ocr.calls(), 3);
    }

    #[test]
    fn custom_resolver_is_used_for_invoices() {
        struct Fixed;
        impl FieldResolver for Fixed {
            fn resolve(&self, _: &[crate::types::OcrToken]) -> HashMap<String, String> {
                HashMap::from([("产地".to_string(), "天津".to_string())])
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let unit = dir.path().join("root").join("inv");
        fs::create_dir_all(&unit).unwrap();
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([90, 120, 200]));
        img.save(unit.join("scan.png")).unwrap();

        let ocr = MockOcr::new(|_: DocumentMode, _: &[u8]| Ok(RawFieldResult::Invoice(vec![])));
        let obs = RecordingObserver::default();
        let cfg = RunConfig::new(dir.path().join("root"), DocumentMode::Invoice)
            .with_checkpoint(dir.path().join("checkpoint.csv"));
        let t = table(BatchWalker::new(&ocr, &obs).with_resolver(Fixed).run(&cfg).unwrap());
        assert_eq!(t.rows[0].len(), 24);
        assert_eq!(t.rows[0].get(t.schema, "产地"), Some("天津"));
    }
}
