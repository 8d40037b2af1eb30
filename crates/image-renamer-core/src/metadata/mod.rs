//! Persistence of analysis fields into image containers.
//!
//! One shared XMP payload, three format strategies: hand-rolled chunk
//! injection for PNG, the standard APP1 segment (with read-back
//! verification) for JPEG, and a best-effort RIFF chunk for WebP.

pub mod jpeg;
pub mod png;
pub mod webp;
pub mod xmp;

use log::{debug, info};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::AnalysisRecord;

/// The field set the codec can persist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFields {
    pub title: Option<String>,
    /// Human-readable block merging description, subject and comments
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub date: Option<String>,
}

impl MetadataFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_empty()
            && self.author.is_none()
            && self.copyright.is_none()
            && self.date.is_none()
    }

    /// Collect the writable fields from a record's final view
    pub fn from_record(record: &AnalysisRecord) -> Self {
        let Some(analysis) = &record.analysis else {
            return Self::default();
        };

        // Merge the free-text fields into one readable block
        let mut sections = Vec::new();
        if let Some(subject) = &analysis.subject {
            sections.push(format!("Subject: {}", subject));
        }
        if let Some(description) = &analysis.description {
            sections.push(description.clone());
        }
        if let Some(comments) = &analysis.comments {
            sections.push(comments.clone());
        }
        let description = if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        };

        Self {
            title: analysis.title.clone(),
            description,
            tags: record.final_tags().to_vec(),
            author: analysis.authors.clone(),
            copyright: analysis.copyright.clone(),
            date: analysis.visible_date.clone(),
        }
    }
}

/// Write metadata into a file, returning whether anything was persisted
///
/// An empty field set returns false without touching the file.
/// JPEG writes are verified by re-reading the file; a verification
/// miss is an error. WebP is best-effort and reports true even though
/// some readers will not surface every field.
pub fn write_metadata(path: &Path, fields: &MetadataFields) -> Result<bool> {
    if fields.is_empty() {
        debug!("No fields to write for {}", path.display());
        return Ok(false);
    }

    let packet = xmp::build_packet(fields);

    match extension_of(path).as_deref() {
        Some("png") => {
            png::write_xmp(path, &packet)?;
            info!("Wrote XMP chunk into {}", path.display());
            Ok(true)
        }
        Some("jpg") | Some("jpeg") => {
            jpeg::write_xmp(path, &packet)?;
            verify_round_trip(path, fields)?;
            info!("Wrote XMP segment into {}", path.display());
            Ok(true)
        }
        Some("webp") => {
            webp::write_xmp(path, &packet)?;
            info!("Wrote best-effort XMP into {}", path.display());
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Read back whatever metadata this codec previously embedded
pub fn read_metadata(path: &Path) -> Result<Option<MetadataFields>> {
    let packet = match extension_of(path).as_deref() {
        Some("png") => png::read_xmp(path)?,
        Some("jpg") | Some("jpeg") => jpeg::read_xmp(path)?,
        Some("webp") => webp::read_xmp(path)?,
        _ => None,
    };

    Ok(packet.map(|p| xmp::parse_packet(&p)))
}

/// Confirm at least one written field survives a re-read
fn verify_round_trip(path: &Path, written: &MetadataFields) -> Result<()> {
    let read_back = read_metadata(path)?.unwrap_or_default();

    let any_match = (written.title.is_some() && read_back.title == written.title)
        || (written.description.is_some() && read_back.description == written.description)
        || (!written.tags.is_empty() && read_back.tags == written.tags)
        || (written.author.is_some() && read_back.author == written.author)
        || (written.copyright.is_some() && read_back.copyright == written.copyright)
        || (written.date.is_some() && read_back.date == written.date);

    if any_match {
        Ok(())
    } else {
        Err(Error::Metadata(format!(
            "Post-write verification failed for {}",
            path.display()
        )))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisStatus, VisionAnalysis};
    use std::path::PathBuf;

    fn fields() -> MetadataFields {
        MetadataFields {
            title: Some("A dog running".to_string()),
            description: Some("A dog running in a park".to_string()),
            tags: vec!["dog".to_string(), "park".to_string()],
            author: Some("Jane Doe".to_string()),
            copyright: None,
            date: None,
        }
    }

    #[test]
    fn test_png_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, crate::metadata::png::tests::minimal_png()).unwrap();

        assert!(write_metadata(&path, &fields()).unwrap());

        let read_back = read_metadata(&path).unwrap().unwrap();
        assert_eq!(read_back, fields());
    }

    #[test]
    fn test_jpeg_write_read_round_trip_with_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.jpg");
        std::fs::write(&path, crate::metadata::jpeg::tests::minimal_jpeg()).unwrap();

        assert!(write_metadata(&path, &fields()).unwrap());

        let read_back = read_metadata(&path).unwrap().unwrap();
        assert_eq!(read_back, fields());
    }

    #[test]
    fn test_jpeg_with_only_a_date_passes_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.jpg");
        std::fs::write(&path, crate::metadata::jpeg::tests::minimal_jpeg()).unwrap();

        let date_only = MetadataFields {
            date: Some("2024-06-01".to_string()),
            ..Default::default()
        };
        assert!(write_metadata(&path, &date_only).unwrap());

        let read_back = read_metadata(&path).unwrap().unwrap();
        assert_eq!(read_back.date.as_deref(), Some("2024-06-01"));
    }

    #[test]
    fn test_empty_fields_do_not_touch_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        let original = crate::metadata::png::tests::minimal_png();
        std::fs::write(&path, &original).unwrap();

        let written = write_metadata(&path, &MetadataFields::default()).unwrap();

        assert!(!written);
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_unsupported_extension_reports_nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.bmp");
        std::fs::write(&path, b"BM fake bitmap").unwrap();

        assert!(!write_metadata(&path, &fields()).unwrap());
        assert_eq!(read_metadata(&path).unwrap(), None);
    }

    #[test]
    fn test_fields_from_record_merge_free_text() {
        let mut record = AnalysisRecord::pending(PathBuf::from("/p/a.jpg"), 1);
        record.analysis = Some(VisionAnalysis {
            suggested_filename: "a_dog".to_string(),
            title: Some("Dog".to_string()),
            subject: Some("animals".to_string()),
            description: Some("A dog.".to_string()),
            comments: Some("Shot on film.".to_string()),
            tags: vec!["dog".to_string()],
            ..Default::default()
        });
        record.status = AnalysisStatus::Success;

        let fields = MetadataFields::from_record(&record);
        assert_eq!(
            fields.description.as_deref(),
            Some("Subject: animals\n\nA dog.\n\nShot on film.")
        );
        assert_eq!(fields.tags, vec!["dog"]);
    }

    #[test]
    fn test_record_without_analysis_yields_empty_fields() {
        let record = AnalysisRecord::pending(PathBuf::from("/p/a.jpg"), 1);
        assert!(MetadataFields::from_record(&record).is_empty());
    }
}
