//! Sequencing of the analysis pipeline: fingerprint, cache lookup,
//! preprocessing handoff, endpoint call, result assembly.
//!
//! The endpoint is a single local resource, so batches run strictly in
//! order with no concurrent calls. Per-item failures are captured into
//! the item's own record; only the caller decides whether a batch as a
//! whole was worth it.

use chrono::Utc;
use log::{debug, info};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::AnalysisCache;
use crate::client::VisionAnalyzer;
use crate::config::Config;
use crate::hashing::compute_fingerprint;
use crate::preprocess::{ImagePreprocessor, PassthroughPreprocessor, TempFileRegistry};
use crate::types::{AnalysisRecord, AnalysisStatus};

/// Progress callback: `(current, total, filename)` after each item
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize, &str);

/// Per-item callback for auto-apply mode
pub type ResultFn<'a> = &'a mut dyn FnMut(&AnalysisRecord);

/// Drives per-image analysis and batch execution
pub struct Orchestrator<A: VisionAnalyzer> {
    analyzer: A,
    cache: Arc<AnalysisCache>,
    preprocessor: Box<dyn ImagePreprocessor + Send + Sync>,
    temp_files: TempFileRegistry,
    config: Config,
}

impl<A: VisionAnalyzer> Orchestrator<A> {
    pub fn new(analyzer: A, cache: Arc<AnalysisCache>, config: &Config) -> Self {
        Self {
            analyzer,
            cache,
            preprocessor: Box::new(PassthroughPreprocessor),
            temp_files: TempFileRegistry::new(),
            config: config.clone(),
        }
    }

    /// Swap in an external resize/re-encode step
    pub fn with_preprocessor(
        mut self,
        preprocessor: Box<dyn ImagePreprocessor + Send + Sync>,
    ) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// True when the endpoint is reachable and has a model loaded
    pub fn endpoint_available(&self) -> bool {
        self.analyzer.is_available()
    }

    /// Analyze one file: Pending → Analyzing → {Success | Failed}
    ///
    /// Never returns an error; failures land in the record so a bad
    /// image cannot abort a batch.
    pub fn analyze_file(&self, path: &Path) -> AnalysisRecord {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let mut record = AnalysisRecord::pending(path.to_path_buf(), size);
        record.status = AnalysisStatus::Analyzing;

        record.fingerprint = match compute_fingerprint(path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                return fail(record, format!("Could not read file: {}", e));
            }
        };

        // A cache hit short-circuits the endpoint entirely; the cached
        // fields are rebound to the current path.
        if let Some(cached) = self.cache.get(&record.fingerprint) {
            if cached.status == AnalysisStatus::Success {
                debug!("Cache hit for {}", path.display());
                return cached.rebound_to(path.to_path_buf(), size);
            }
        }

        let prepared = match self.preprocessor.prepare(path) {
            Ok(prepared) => prepared,
            Err(e) => {
                return fail(record, format!("Preprocessing failed: {}", e));
            }
        };

        match self.analyzer.analyze(
            &prepared.bytes,
            prepared.mime,
            Some(record.original_name.as_str()),
        ) {
            Ok(analysis) => {
                record.analysis = Some(analysis);
                record.status = AnalysisStatus::Success;
                record.timestamp = Utc::now();
                self.cache.insert(&record);
                record
            }
            Err(e) => fail(record, e.to_string()),
        }
    }

    /// Analyze a batch strictly in order
    ///
    /// Cancellation is cooperative: the flag is checked between items,
    /// and items never reached come back as `Skipped` records rather
    /// than vanishing from the result list. `on_result` fires after
    /// every analyzed item for auto-apply callers.
    pub fn analyze_batch(
        &self,
        paths: &[impl AsRef<Path>],
        cancel: &AtomicBool,
        progress: Option<ProgressFn>,
        on_result: Option<ResultFn>,
    ) -> Vec<AnalysisRecord> {
        let total = paths.len();
        let mut results = Vec::with_capacity(total);
        let mut progress = progress;
        let mut on_result = on_result;

        for (index, path) in paths.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                info!(
                    "Batch cancelled after {} of {} items",
                    results.len(),
                    total
                );
                // Unreached items come back marked, not silently absent
                for path in &paths[index..] {
                    let mut record = AnalysisRecord::pending(path.as_ref().to_path_buf(), 0);
                    record.status = AnalysisStatus::Skipped;
                    results.push(record);
                }
                break;
            }

            let path = path.as_ref();
            let record = self.analyze_file(path);

            if let Some(progress) = progress.as_mut() {
                progress(index + 1, total, &record.original_name);
            }
            if let Some(on_result) = on_result.as_mut() {
                on_result(&record);
            }

            results.push(record);
        }

        self.temp_files.cleanup();
        results
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn fail(mut record: AnalysisRecord, message: String) -> AnalysisRecord {
    record.status = AnalysisStatus::Failed;
    record.error = Some(message);
    record.timestamp = Utc::now();
    record
}

// -- Tests --
