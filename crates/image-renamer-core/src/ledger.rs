//! Session persistence and reversal.
//!
//! Every executed session is written to its own JSON file immediately
//! after execution, so undo survives a process restart. Reverts are
//! tolerant: a file that moved or vanished since the session ran is
//! skipped and counted, never fatal.

use log::{info, warn};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::{AppliedChangeRecord, RenameSession};

/// Persistent store of rename sessions, the seat of undo
pub struct UndoLedger {
    session_dir: PathBuf,
    /// In-process handle to the most recent session
    last: Mutex<Option<RenameSession>>,
}

impl UndoLedger {
    pub fn new(session_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&session_dir)
            .map_err(|e| Error::Session(format!("Cannot create session dir: {}", e)))?;
        Ok(Self {
            session_dir,
            last: Mutex::new(None),
        })
    }

    fn session_path(&self, session: &RenameSession) -> PathBuf {
        self.session_dir.join(format!("{}.json", session.id))
    }

    /// Persist a session immediately after execution
    pub fn record(&self, session: &RenameSession) -> Result<()> {
        let path = self.session_path(session);
        let file = std::fs::File::create(&path)
            .map_err(|e| Error::Session(format!("Cannot create session file: {}", e)))?;
        serde_json::to_writer_pretty(file, session)
            .map_err(|e| Error::Session(format!("Cannot write session file: {}", e)))?;

        info!("Recorded session {} ({} operations)", session.id, session.operations.len());

        if let Ok(mut last) = self.last.lock() {
            *last = Some(session.clone());
        }
        Ok(())
    }

    /// All persisted sessions, newest first, skipping unreadable entries
    pub fn list_sessions(&self) -> Vec<RenameSession> {
        let mut sessions: Vec<RenameSession> = match std::fs::read_dir(&self.session_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                .filter_map(|e| {
                    let file = std::fs::File::open(e.path()).ok()?;
                    match serde_json::from_reader(file) {
                        Ok(session) => Some(session),
                        Err(err) => {
                            warn!("Skipping corrupt session file {}: {}", e.path().display(), err);
                            None
                        }
                    }
                })
                .collect(),
            Err(_) => Vec::new(),
        };

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// A specific session by identifier
    pub fn session_by_id(&self, id: &str) -> Option<RenameSession> {
        self.list_sessions().into_iter().find(|s| s.id == id)
    }

    /// The most recent session whose undone flag is still false
    ///
    /// The in-process handle is checked first; otherwise the persisted
    /// sessions are scanned newest-first.
    pub fn last_undoable(&self) -> Option<RenameSession> {
        if let Ok(last) = self.last.lock() {
            if let Some(session) = last.as_ref() {
                if !session.undone {
                    return Some(session.clone());
                }
            }
        }
        self.list_sessions().into_iter().find(|s| !s.undone)
    }

    /// Revert a whole session, walking successful operations in reverse
    ///
    /// Returns the number of files actually moved back. Per-file
    /// failures are tolerated; a second invocation reverts zero.
    pub fn undo_session(&self, session: &mut RenameSession) -> Result<usize> {
        if session.undone {
            return Ok(0);
        }

        let mut reverted = 0;
        for op in session.operations.iter().rev() {
            if !op.success {
                continue;
            }
            // rename overwrites on Unix; a file that re-occupied the
            // original path since the session ran must survive
            if op.original_path.exists() {
                warn!(
                    "Not reverting {}: original path is occupied",
                    op.original_path.display()
                );
                continue;
            }
            match std::fs::rename(&op.new_path, &op.original_path) {
                Ok(()) => {
                    reverted += 1;
                    info!(
                        "Reverted {} -> {}",
                        op.new_path.display(),
                        op.original_path.display()
                    );
                }
                Err(e) => {
                    warn!(
                        "Could not revert {} -> {}: {}",
                        op.new_path.display(),
                        op.original_path.display(),
                        e
                    );
                }
            }
        }

        session.undone = true;
        self.record(session)?;
        Ok(reverted)
    }

    /// Revert a single applied change; metadata is non-reversible
    pub fn undo_change(&self, change: &AppliedChangeRecord) -> Result<()> {
        if !change.renamed {
            return Ok(());
        }
        if change.original_path.exists() {
            return Err(Error::Session(format!(
                "Original path is occupied: {}",
                change.original_path.display()
            )));
        }
        std::fs::rename(&change.new_path, &change.original_path)
            .map_err(|e| Error::Session(format!("Could not revert {}: {}", change.new_path.display(), e)))?;
        info!(
            "Selectively reverted {} -> {}",
            change.new_path.display(),
            change.original_path.display()
        );
        Ok(())
    }
}

// -- Tests --
