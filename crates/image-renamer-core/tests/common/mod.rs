//! Shared fixtures for integration tests.
//!
//! Fixture images are the smallest byte streams the codecs accept;
//! scan/pixel data is dummy since the pipeline never decodes it.

use std::path::{Path, PathBuf};

use image_renamer_core::metadata::png::{write_chunks, Chunk};
use image_renamer_core::{AnalysisRecord, AnalysisStatus, VisionAnalysis};

/// A syntactically valid PNG: IHDR, one IDAT, IEND
pub fn minimal_png_bytes() -> Vec<u8> {
    let ihdr = Chunk::new(
        *b"IHDR",
        vec![0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0],
    );
    let idat = Chunk::new(*b"IDAT", vec![0x78, 0x9C, 0x62, 0x00, 0x00]);
    let iend = Chunk::new(*b"IEND", Vec::new());
    write_chunks(&[ihdr, idat, iend])
}

/// A syntactically valid JPEG: SOI, JFIF APP0, SOS with dummy scan, EOI
pub fn minimal_jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    let app0_payload: &[u8] = b"JFIF\0\x01\x01\x00\x00\x01\x00\x01\x00\x00";
    bytes.extend_from_slice(&[0xFF, 0xE0]);
    bytes.extend_from_slice(&((app0_payload.len() as u16 + 2).to_be_bytes()));
    bytes.extend_from_slice(app0_payload);
    bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
    bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// An analysis record in the state the orchestrator leaves it in after
/// a successful endpoint call
pub fn successful_record(path: &Path, stem: &str, tags: &[&str]) -> AnalysisRecord {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut record = AnalysisRecord::pending(path.to_path_buf(), size);
    record.status = AnalysisStatus::Success;
    record.analysis = Some(VisionAnalysis {
        suggested_filename: stem.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    });
    record
}
