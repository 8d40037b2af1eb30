//! Best-effort WebP XMP support.
//!
//! WebP is a RIFF container; XMP lives in an `XMP ` chunk, and an
//! extended-format (VP8X) header carries a flag advertising it. Files
//! without a VP8X header get the chunk appended anyway; some readers
//! pick it up and some do not, so callers must not assume full
//! fidelity for this format.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

const XMP_FOURCC: [u8; 4] = *b"XMP ";
const VP8X_FOURCC: [u8; 4] = *b"VP8X";

/// XMP-present bit in the VP8X flags byte
const VP8X_XMP_FLAG: u8 = 0x04;

#[derive(Debug, Clone)]
struct RiffChunk {
    fourcc: [u8; 4],
    data: Vec<u8>,
}

fn parse_chunks(bytes: &[u8]) -> Result<Vec<RiffChunk>> {
    if bytes.len() < 12 || &bytes[..4] != b"RIFF" || &bytes[8..12] != b"WEBP" {
        return Err(Error::Metadata("Not a WebP file".to_string()));
    }

    let mut chunks = Vec::new();
    let mut offset = 12;

    while offset + 8 <= bytes.len() {
        let fourcc: [u8; 4] = bytes[offset..offset + 4].try_into().unwrap();
        let size =
            u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let data_start = offset + 8;
        if data_start + size > bytes.len() {
            return Err(Error::Metadata("Truncated WebP chunk".to_string()));
        }
        chunks.push(RiffChunk {
            fourcc,
            data: bytes[data_start..data_start + size].to_vec(),
        });
        // Chunks are padded to even sizes
        offset = data_start + size + (size & 1);
    }

    Ok(chunks)
}

fn serialize(chunks: &[RiffChunk]) -> Vec<u8> {
    let mut body = Vec::new();
    for chunk in chunks {
        body.extend_from_slice(&chunk.fourcc);
        body.extend_from_slice(&(chunk.data.len() as u32).to_le_bytes());
        body.extend_from_slice(&chunk.data);
        if chunk.data.len() % 2 == 1 {
            body.push(0);
        }
    }

    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&body);
    out
}

/// Append (or replace) the XMP chunk; best effort only
pub fn write_xmp(path: &Path, packet: &str) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let mut chunks = parse_chunks(&bytes)?;

    chunks.retain(|c| c.fourcc != XMP_FOURCC);
    chunks.push(RiffChunk {
        fourcc: XMP_FOURCC,
        data: packet.as_bytes().to_vec(),
    });

    match chunks.iter_mut().find(|c| c.fourcc == VP8X_FOURCC) {
        Some(vp8x) if !vp8x.data.is_empty() => vp8x.data[0] |= VP8X_XMP_FLAG,
        _ => debug!(
            "{}: no VP8X header, XMP chunk appended without flag",
            path.display()
        ),
    }

    std::fs::write(path, serialize(&chunks))?;
    Ok(())
}

/// The XMP packet currently embedded in a WebP file, if any
pub fn read_xmp(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    let chunks = parse_chunks(&bytes)?;

    Ok(chunks
        .iter()
        .find(|c| c.fourcc == XMP_FOURCC)
        .map(|c| String::from_utf8_lossy(&c.data).into_owned()))
}

// -- Tests --

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Minimal extended-format WebP: VP8X header plus a stub image chunk
    pub fn minimal_webp() -> Vec<u8> {
        let vp8x = RiffChunk {
            fourcc: VP8X_FOURCC,
            data: vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        };
        let vp8 = RiffChunk {
            fourcc: *b"VP8 ",
            data: vec![0x00, 0x01, 0x02],
        };
        serialize(&[vp8x, vp8])
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.webp");
        std::fs::write(&path, minimal_webp()).unwrap();

        write_xmp(&path, "<packet/>").unwrap();
        assert_eq!(read_xmp(&path).unwrap().as_deref(), Some("<packet/>"));
    }

    #[test]
    fn test_vp8x_flag_is_set_and_chunk_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.webp");
        std::fs::write(&path, minimal_webp()).unwrap();

        write_xmp(&path, "<first/>").unwrap();
        write_xmp(&path, "<second/>").unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let chunks = parse_chunks(&bytes).unwrap();

        let xmp_count = chunks.iter().filter(|c| c.fourcc == XMP_FOURCC).count();
        assert_eq!(xmp_count, 1);

        let vp8x = chunks.iter().find(|c| c.fourcc == VP8X_FOURCC).unwrap();
        assert_ne!(vp8x.data[0] & VP8X_XMP_FLAG, 0);
    }

    #[test]
    fn test_non_webp_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.webp");
        std::fs::write(&path, b"not riff data").unwrap();
        assert!(write_xmp(&path, "<p/>").is_err());
    }
}
