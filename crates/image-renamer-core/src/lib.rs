//! Core functionality for AI-assisted image renaming and tagging.
//!
//! This library provides the foundational components of the pipeline:
//! - Image discovery and content fingerprinting
//! - Vision endpoint client with retry and response repair
//! - Collision-safe rename planning and execution
//! - XMP metadata embedding for JPEG, PNG and WebP
//! - Session persistence and undo

// -- External Dependencies --

use log::info;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use types::*;

// -- Public Modules --
pub mod cache;
pub mod client;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod hashing;
pub mod ledger;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod preprocess;
pub mod rename;
pub mod types;

use cache::AnalysisCache;
use client::VisionClient;
use ledger::UndoLedger;
use orchestrator::{Orchestrator, ProgressFn, ResultFn};

/// Main entry point for the rename/tag pipeline
pub struct ImageRenamer {
    config: Config,
    orchestrator: Orchestrator<VisionClient>,
    ledger: UndoLedger,
}

impl ImageRenamer {
    /// Create a new ImageRenamer with the provided configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = VisionClient::new(&config)?;
        let cache = Arc::new(AnalysisCache::new());
        let orchestrator = Orchestrator::new(client, cache, &config);
        let ledger = UndoLedger::new(config.session_log_dir())?;

        Ok(Self {
            config,
            orchestrator,
            ledger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover all candidate images under the provided directory
    pub fn discover_images(&self, directory: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        discovery::enumerate_images(directory.as_ref(), self.config.recursive)
    }

    /// Whether the inference endpoint is reachable and has a model loaded
    pub fn endpoint_available(&self) -> bool {
        self.orchestrator.endpoint_available()
    }

    /// Analyze a batch of images, reporting progress per item
    ///
    /// Cancellation is cooperative: flip `cancel` and the batch stops
    /// after the in-flight item, returning the records produced so far.
    pub fn analyze_batch(
        &self,
        paths: &[impl AsRef<Path>],
        cancel: &AtomicBool,
        progress: Option<ProgressFn>,
        on_result: Option<ResultFn>,
    ) -> Vec<AnalysisRecord> {
        self.orchestrator.analyze_batch(paths, cancel, progress, on_result)
    }

    /// Plan and execute renames for successful analyses, then persist
    /// the session for undo
    pub fn apply(&self, records: &[AnalysisRecord]) -> Result<RenameSession> {
        let operations = rename::plan_renames(records);
        if operations.is_empty() {
            info!("Nothing to apply: no successful analyses produced a new name");
            return Ok(RenameSession::new());
        }

        let results_by_original: std::collections::HashMap<PathBuf, AnalysisRecord> = records
            .iter()
            .map(|r| (r.path.clone(), r.clone()))
            .collect();

        let session = rename::execute_renames(operations, Some(&results_by_original), &self.config);
        self.ledger.record(&session)?;
        info!(
            "Session {}: {} renamed, {} failed",
            session.id,
            session.success_count(),
            session.failure_count()
        );
        Ok(session)
    }

    /// Revert the most recent session that has not yet been undone
    ///
    /// Returns the session and the number of files moved back, or None
    /// when no undoable session exists.
    pub fn undo_last(&self) -> Result<Option<(RenameSession, usize)>> {
        match self.ledger.last_undoable() {
            Some(mut session) => {
                let reverted = self.ledger.undo_session(&mut session)?;
                Ok(Some((session, reverted)))
            }
            None => Ok(None),
        }
    }

    /// Revert a specific session by identifier
    pub fn undo_session(&self, id: &str) -> Result<Option<(RenameSession, usize)>> {
        match self.ledger.session_by_id(id) {
            Some(mut session) => {
                let reverted = self.ledger.undo_session(&mut session)?;
                Ok(Some((session, reverted)))
            }
            None => Ok(None),
        }
    }

    /// All recorded sessions, newest first
    pub fn list_sessions(&self) -> Vec<RenameSession> {
        self.ledger.list_sessions()
    }
}
