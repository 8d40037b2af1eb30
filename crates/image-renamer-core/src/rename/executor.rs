use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::Config;
use crate::metadata::{self, MetadataFields};
use crate::types::{AnalysisRecord, RenameOperation, RenameSession};

/// Execute a plan strictly in order, producing a session for the ledger
///
/// Operations are independent: a failed move is recorded on its own
/// operation and execution continues. When metadata writing is enabled
/// and a record is available for the original path, the codec runs
/// against the *new* path after a short settle delay; a codec failure
/// downgrades the operation's message but never the rename itself.
pub fn execute_renames(
    operations: Vec<RenameOperation>,
    results_by_original: Option<&HashMap<PathBuf, AnalysisRecord>>,
    config: &Config,
) -> RenameSession {
    let mut session = RenameSession::new();

    for mut op in operations {
        // The plan's collision check ran earlier; a file that appeared
        // at the target since then must not be clobbered by rename's
        // overwrite semantics.
        if op.new_path.exists() {
            error!(
                "Destination appeared since planning, refusing to overwrite {}",
                op.new_path.display()
            );
            op.success = false;
            op.message = Some(format!(
                "Destination already exists: {}",
                op.new_path.display()
            ));
            session.operations.push(op);
            continue;
        }

        match std::fs::rename(&op.original_path, &op.new_path) {
            Ok(()) => {
                op.success = true;
                info!(
                    "Renamed {} -> {}",
                    op.original_path.display(),
                    op.new_path.display()
                );

                let record = results_by_original
                    .and_then(|map| map.get(&op.original_path));

                if config.write_metadata {
                    if let Some(record) = record {
                        // Let the OS release the handle from the move
                        if config.metadata_write_delay_ms > 0 {
                            std::thread::sleep(Duration::from_millis(
                                config.metadata_write_delay_ms,
                            ));
                        }

                        let fields = MetadataFields::from_record(record);
                        match metadata::write_metadata(&op.new_path, &fields) {
                            Ok(written) => op.metadata_written = written,
                            Err(e) => {
                                warn!(
                                    "Metadata write failed for {}: {}",
                                    op.new_path.display(),
                                    e
                                );
                                op.message =
                                    Some(format!("Renamed, but metadata write failed: {}", e));
                            }
                        }
                    }
                }
            }
            Err(e) => {
                error!(
                    "Failed to rename {} -> {}: {}",
                    op.original_path.display(),
                    op.new_path.display(),
                    e
                );
                op.success = false;
                op.message = Some(e.to_string());
            }
        }

        session.operations.push(op);
    }

    session
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn create_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();
        path
    }

    fn no_metadata_config() -> Config {
        let mut config = Config::default();
        config.write_metadata = false;
        config.metadata_write_delay_ms = 0;
        config
    }

    #[test]
    fn test_executes_moves_in_plan_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = create_file(dir.path(), "a.jpg");
        let b = create_file(dir.path(), "b.jpg");

        let plan = vec![
            RenameOperation::planned(a.clone(), dir.path().join("first.jpg"), vec![]),
            RenameOperation::planned(b.clone(), dir.path().join("second.jpg"), vec![]),
        ];

        let session = execute_renames(plan, None, &no_metadata_config());

        assert_eq!(session.success_count(), 2);
        assert!(dir.path().join("first.jpg").exists());
        assert!(dir.path().join("second.jpg").exists());
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_destination_created_after_planning_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let source = create_file(dir.path(), "img.jpg");
        let target = dir.path().join("sunset.jpg");

        let plan = vec![RenameOperation::planned(source.clone(), target.clone(), vec![])];

        // An unrelated file lands on the target between plan and execute
        std::fs::File::create(&target)
            .unwrap()
            .write_all(b"unrelated photo")
            .unwrap();

        let session = execute_renames(plan, None, &no_metadata_config());

        assert_eq!(session.success_count(), 0);
        assert_eq!(session.failure_count(), 1);
        assert!(session.operations[0]
            .message
            .as_ref()
            .is_some_and(|m| m.contains("already exists")));
        // Both files survive untouched
        assert!(source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"unrelated photo");
    }

    #[test]
    fn test_one_failure_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("vanished.jpg");
        let b = create_file(dir.path(), "b.jpg");

        let plan = vec![
            RenameOperation::planned(missing, dir.path().join("x.jpg"), vec![]),
            RenameOperation::planned(b, dir.path().join("y.jpg"), vec![]),
        ];

        let session = execute_renames(plan, None, &no_metadata_config());

        assert_eq!(session.failure_count(), 1);
        assert_eq!(session.success_count(), 1);
        assert!(session.operations[0].message.is_some());
        assert!(dir.path().join("y.jpg").exists());
    }
}
