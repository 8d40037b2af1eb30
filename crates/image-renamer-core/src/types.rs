use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of a single image through the analysis pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    /// Not yet looked at
    Pending,

    /// Fingerprint computed, endpoint call in flight
    Analyzing,

    /// Analysis produced a usable suggestion
    Success,

    /// Analysis failed; `error` carries the reason
    Failed,

    /// Deliberately not analyzed (e.g. cancelled before reaching it)
    Skipped,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Success => "success",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Structured fields recovered from one model response
///
/// Every field except the filename is populated only when the model
/// reported direct evidence for it; absence means "unknown", never a
/// guess.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    /// Sanitized filename stem, always filesystem-legal
    pub suggested_filename: String,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub comments: Option<String>,
    pub authors: Option<String>,
    pub copyright: Option<String>,
    pub visible_date: Option<String>,
}

/// One image's identity plus everything the pipeline learned about it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Full path to the image at analysis time
    pub path: PathBuf,

    /// File name component of `path`
    pub original_name: String,

    /// Lowercased extension without the dot
    pub extension: String,

    /// File size in bytes
    pub size: u64,

    /// Content fingerprint (blake3 hex), the cache key
    pub fingerprint: String,

    /// Model-derived fields; present only when status is Success
    pub analysis: Option<VisionAnalysis>,

    /// Lifecycle status
    pub status: AnalysisStatus,

    /// Failure reason; non-empty exactly when status is Failed.
    /// Kept in full, display layers truncate as needed.
    pub error: Option<String>,

    /// When the record reached a terminal status
    pub timestamp: DateTime<Utc>,

    /// User-edited filename stem; overrides the suggestion when set
    pub edited_filename: Option<String>,

    /// User-edited tag list; overrides the suggestion when set
    pub edited_tags: Option<Vec<String>>,
}

impl AnalysisRecord {
    /// Create a Pending record for a file that has not been analyzed
    pub fn pending(path: PathBuf, size: u64) -> Self {
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self {
            path,
            original_name,
            extension,
            size,
            fingerprint: String::new(),
            analysis: None,
            status: AnalysisStatus::Pending,
            error: None,
            timestamp: Utc::now(),
            edited_filename: None,
            edited_tags: None,
        }
    }

    /// The filename stem that would actually be used, preferring the
    /// user's edit over the model's suggestion
    pub fn final_filename(&self) -> Option<&str> {
        if let Some(edited) = &self.edited_filename {
            if !edited.is_empty() {
                return Some(edited);
            }
        }
        self.analysis
            .as_ref()
            .map(|a| a.suggested_filename.as_str())
            .filter(|s| !s.is_empty())
    }

    /// The tag list that would actually be written
    pub fn final_tags(&self) -> &[String] {
        if let Some(edited) = &self.edited_tags {
            return edited;
        }
        self.analysis.as_ref().map(|a| a.tags.as_slice()).unwrap_or(&[])
    }

    /// Clone a cached record, rebinding identity to a new path
    ///
    /// Used on cache hits: the content (and therefore the analysis) is
    /// identical, only path-derived fields change.
    pub fn rebound_to(&self, path: PathBuf, size: u64) -> Self {
        let mut record = Self::pending(path, size);
        record.fingerprint = self.fingerprint.clone();
        record.analysis = self.analysis.clone();
        record.status = self.status;
        record.timestamp = Utc::now();
        record
    }
}

/// One planned (and later executed) filesystem move
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOperation {
    /// Path before the move
    pub original_path: PathBuf,

    /// Collision-free target path
    pub new_path: PathBuf,

    /// Whether the move itself succeeded
    pub success: bool,

    /// Outcome detail; set by the executor
    pub message: Option<String>,

    /// Whether metadata was persisted into the moved file
    pub metadata_written: bool,

    /// Tags intended for the metadata write
    pub tags: Vec<String>,
}

impl RenameOperation {
    pub fn planned(original_path: PathBuf, new_path: PathBuf, tags: Vec<String>) -> Self {
        Self {
            original_path,
            new_path,
            success: false,
            message: None,
            metadata_written: false,
            tags,
        }
    }
}

/// One coherent batch of rename operations, the unit of undo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameSession {
    /// Stable identifier, derived from the creation timestamp
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Operations in execution (and therefore undo) order
    pub operations: Vec<RenameOperation>,

    /// Whether a full-session revert has been applied
    pub undone: bool,
}

impl RenameSession {
    /// Create an empty session stamped with the current time
    pub fn new() -> Self {
        let created_at = Utc::now();
        Self {
            id: created_at.format("%Y%m%d-%H%M%S%3f").to_string(),
            created_at,
            operations: Vec::new(),
            undone: false,
        }
    }

    /// Number of operations that moved a file
    pub fn success_count(&self) -> usize {
        self.operations.iter().filter(|op| op.success).count()
    }

    /// Number of operations that failed to move
    pub fn failure_count(&self) -> usize {
        self.operations.iter().filter(|op| !op.success).count()
    }
}

impl Default for RenameSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Denormalized view of one applied change, for display and selective undo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedChangeRecord {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub original_name: String,
    pub new_name: String,

    /// False when the operation only wrote metadata
    pub renamed: bool,
    pub metadata_written: bool,

    pub timestamp: DateTime<Utc>,
    pub session_id: String,

    /// Toggled by the user to include this entry in a selective undo
    pub selected_for_undo: bool,
}

impl AppliedChangeRecord {
    /// Project an executed operation into its display form
    pub fn from_operation(op: &RenameOperation, session_id: &str) -> Self {
        Self {
            original_path: op.original_path.clone(),
            new_path: op.new_path.clone(),
            original_name: op
                .original_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            new_name: op
                .new_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            renamed: op.success && op.original_path != op.new_path,
            metadata_written: op.metadata_written,
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            selected_for_undo: false,
        }
    }
}
