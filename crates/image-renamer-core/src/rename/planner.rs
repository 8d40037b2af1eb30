use std::collections::HashSet;
use std::path::PathBuf;

use log::debug;

use crate::types::{AnalysisRecord, AnalysisStatus, RenameOperation};

/// Convert approved analysis results into a collision-free plan
///
/// Only `Success` records with a usable final name contribute. Targets
/// stay in each record's own directory and keep the original
/// extension. Plan order preserves input order, which fixes execution
/// and therefore undo order.
pub fn plan_renames(records: &[AnalysisRecord]) -> Vec<RenameOperation> {
    let mut operations = Vec::new();
    // Names already claimed in this planning pass
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for record in records {
        if record.status != AnalysisStatus::Success {
            continue;
        }
        let Some(stem) = record.final_filename() else {
            continue;
        };

        let dir = match record.path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => continue,
        };

        let target = resolve_collision(&dir, stem, &record.extension, &record.path, &claimed);

        if target == record.path {
            debug!("Skipping no-op rename for {}", record.path.display());
            continue;
        }

        claimed.insert(target.clone());
        operations.push(RenameOperation::planned(
            record.path.clone(),
            target,
            record.final_tags().to_vec(),
        ));
    }

    operations
}

/// First non-colliding target for a stem, using the `_N` scheme
fn resolve_collision(
    dir: &std::path::Path,
    stem: &str,
    extension: &str,
    own_path: &std::path::Path,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let make_target = |candidate: &str| -> PathBuf {
        if extension.is_empty() {
            dir.join(candidate)
        } else {
            dir.join(format!("{}.{}", candidate, extension))
        }
    };

    let mut target = make_target(stem);
    let mut suffix = 1u32;
    loop {
        let taken = claimed.contains(&target)
            || (target.exists() && target != own_path);
        if !taken || target == own_path {
            return target;
        }
        target = make_target(&format!("{}_{}", stem, suffix));
        suffix += 1;
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VisionAnalysis;
    use std::io::Write;
    use std::path::Path;

    fn success_record(path: &Path, stem: &str) -> AnalysisRecord {
        let mut record = AnalysisRecord::pending(path.to_path_buf(), 10);
        record.analysis = Some(VisionAnalysis {
            suggested_filename: stem.to_string(),
            tags: vec!["tag".to_string()],
            ..Default::default()
        });
        record.status = AnalysisStatus::Success;
        record
    }

    fn create_file(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();
        path
    }

    #[test]
    fn test_colliding_stems_get_distinct_ordered_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<_> = (0..3)
            .map(|i| {
                let path = create_file(dir.path(), &format!("img_{}.jpg", i));
                success_record(&path, "sunset")
            })
            .collect();

        let plan = plan_renames(&records);

        let names: Vec<_> = plan
            .iter()
            .map(|op| op.new_path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["sunset.jpg", "sunset_1.jpg", "sunset_2.jpg"]);
        // Plan order follows input order
        assert_eq!(plan[0].original_path, records[0].path);
        assert_eq!(plan[2].original_path, records[2].path);
    }

    #[test]
    fn test_existing_file_on_disk_forces_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        create_file(dir.path(), "sunset.jpg");
        let path = create_file(dir.path(), "img.jpg");

        let plan = plan_renames(&[success_record(&path, "sunset")]);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].new_path, dir.path().join("sunset_1.jpg"));
    }

    #[test]
    fn test_target_equal_to_own_path_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_file(dir.path(), "sunset.jpg");

        let plan = plan_renames(&[success_record(&path, "sunset")]);

        assert!(plan.is_empty());
    }

    #[test]
    fn test_failed_records_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_file(dir.path(), "img.jpg");
        let mut record = success_record(&path, "sunset");
        record.status = AnalysisStatus::Failed;
        record.error = Some("boom".to_string());

        assert!(plan_renames(&[record]).is_empty());
    }

    #[test]
    fn test_edited_filename_wins_over_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_file(dir.path(), "img.jpg");
        let mut record = success_record(&path, "sunset");
        record.edited_filename = Some("golden_hour".to_string());

        let plan = plan_renames(&[record]);

        assert_eq!(plan[0].new_path, dir.path().join("golden_hour.jpg"));
    }
}
