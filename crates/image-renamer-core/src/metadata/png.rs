//! Typed PNG chunk reader/writer and XMP injection.
//!
//! A PNG is an 8-byte signature followed by chunks of
//! `length (u32 BE) | type (4 ASCII bytes) | payload | CRC-32`, where
//! the CRC covers type + payload. Getting length or CRC wrong makes
//! the file unreadable by standard viewers, so both are computed here
//! rather than inherited from any buffer arithmetic at call sites.

use once_cell::sync::Lazy;
use std::path::Path;

use crate::error::{Error, Result};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Keyword identifying the XMP iTXt chunk, per the XMP specification
pub const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

/// One self-describing unit of a PNG stream
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(chunk_type: [u8; 4], data: Vec<u8>) -> Self {
        Self { chunk_type, data }
    }

    pub fn is_type(&self, name: &[u8; 4]) -> bool {
        &self.chunk_type == name
    }

    /// iTXt leading keyword, up to the first NUL
    pub fn itxt_keyword(&self) -> Option<&[u8]> {
        if !self.is_type(b"iTXt") {
            return None;
        }
        let end = self.data.iter().position(|b| *b == 0)?;
        Some(&self.data[..end])
    }
}

/// Reflected table-driven CRC-32 with the standard PNG polynomial
static CRC_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (n, entry) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
        }
        *entry = c;
    }
    table
});

/// CRC-32 over the given byte slices in order
pub fn crc32(parts: &[&[u8]]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for part in parts {
        for byte in *part {
            c = CRC_TABLE[((c ^ *byte as u32) & 0xFF) as usize] ^ (c >> 8);
        }
    }
    c ^ 0xFFFF_FFFF
}

/// Parse a complete PNG byte stream into its chunks
pub fn read_chunks(bytes: &[u8]) -> Result<Vec<Chunk>> {
    if bytes.len() < PNG_SIGNATURE.len() || bytes[..8] != PNG_SIGNATURE {
        return Err(Error::Metadata("Not a PNG file".to_string()));
    }

    let mut chunks = Vec::new();
    let mut offset = PNG_SIGNATURE.len();

    while offset + 12 <= bytes.len() {
        let length = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        let type_start = offset + 4;
        let data_start = type_start + 4;
        let crc_start = data_start + length;

        if crc_start + 4 > bytes.len() {
            return Err(Error::Metadata(
                "Truncated PNG chunk stream".to_string(),
            ));
        }

        let chunk_type: [u8; 4] = bytes[type_start..data_start].try_into().unwrap();
        let data = bytes[data_start..crc_start].to_vec();
        let stored_crc =
            u32::from_be_bytes(bytes[crc_start..crc_start + 4].try_into().unwrap());
        let computed = crc32(&[&chunk_type, &data]);
        if stored_crc != computed {
            return Err(Error::Metadata(format!(
                "CRC mismatch in {} chunk",
                String::from_utf8_lossy(&chunk_type)
            )));
        }

        let is_end = chunk_type == *b"IEND";
        chunks.push(Chunk::new(chunk_type, data));
        offset = crc_start + 4;

        if is_end {
            break;
        }
    }

    if !chunks.iter().any(|c| c.is_type(b"IEND")) {
        return Err(Error::Metadata("PNG has no IEND chunk".to_string()));
    }

    Ok(chunks)
}

/// Serialize chunks back into a complete PNG byte stream
pub fn write_chunks(chunks: &[Chunk]) -> Vec<u8> {
    let total: usize = chunks.iter().map(|c| c.data.len() + 12).sum();
    let mut out = Vec::with_capacity(PNG_SIGNATURE.len() + total);
    out.extend_from_slice(&PNG_SIGNATURE);

    for chunk in chunks {
        out.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&chunk.chunk_type);
        out.extend_from_slice(&chunk.data);
        out.extend_from_slice(&crc32(&[&chunk.chunk_type, &chunk.data]).to_be_bytes());
    }

    out
}

/// Build the iTXt chunk carrying an XMP packet
///
/// Layout: keyword NUL, compression flag 0, compression method 0,
/// empty language tag NUL, empty translated keyword NUL, UTF-8 text.
pub fn xmp_chunk(packet: &str) -> Chunk {
    let mut data = Vec::with_capacity(XMP_KEYWORD.len() + 5 + packet.len());
    data.extend_from_slice(XMP_KEYWORD);
    data.push(0); // keyword terminator
    data.push(0); // compression flag: uncompressed
    data.push(0); // compression method
    data.push(0); // language tag terminator
    data.push(0); // translated keyword terminator
    data.extend_from_slice(packet.as_bytes());
    Chunk::new(*b"iTXt", data)
}

/// Inject (or replace) the XMP chunk in a PNG file
///
/// Any existing chunk with the XMP keyword is removed first; the new
/// chunk goes immediately before IEND.
pub fn write_xmp(path: &Path, packet: &str) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let mut chunks = read_chunks(&bytes)?;

    chunks.retain(|c| c.itxt_keyword() != Some(XMP_KEYWORD));

    let end_index = chunks
        .iter()
        .position(|c| c.is_type(b"IEND"))
        .ok_or_else(|| Error::Metadata("PNG has no IEND chunk".to_string()))?;
    chunks.insert(end_index, xmp_chunk(packet));

    std::fs::write(path, write_chunks(&chunks))?;
    Ok(())
}

/// The XMP packet currently embedded in a PNG file, if any
pub fn read_xmp(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    let chunks = read_chunks(&bytes)?;

    for chunk in &chunks {
        if chunk.itxt_keyword() == Some(XMP_KEYWORD) {
            // Skip keyword NUL + two compression bytes + two empty
            // NUL-terminated fields
            let text_start = XMP_KEYWORD.len() + 5;
            if chunk.data.len() <= text_start {
                return Ok(None);
            }
            let text = String::from_utf8_lossy(&chunk.data[text_start..]).into_owned();
            return Ok(Some(text));
        }
    }

    Ok(None)
}

// -- Tests --

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Smallest parseable PNG: signature + IHDR + IDAT + IEND
    pub fn minimal_png() -> Vec<u8> {
        let ihdr = {
            let mut data = Vec::new();
            data.extend_from_slice(&1u32.to_be_bytes()); // width
            data.extend_from_slice(&1u32.to_be_bytes()); // height
            data.extend_from_slice(&[8, 0, 0, 0, 0]); // depth, color, etc.
            Chunk::new(*b"IHDR", data)
        };
        let idat = Chunk::new(*b"IDAT", vec![0x78, 0x9C, 0x01, 0x00]);
        let iend = Chunk::new(*b"IEND", Vec::new());
        write_chunks(&[ihdr, idat, iend])
    }

    #[test]
    fn test_crc32_matches_known_vector() {
        // Standard check value for "123456789"
        assert_eq!(crc32(&[b"123456789"]), 0xCBF4_3926);
        // IEND's fixed CRC, visible in any PNG's last four bytes
        assert_eq!(crc32(&[b"IEND"]), 0xAE42_6082);
    }

    #[test]
    fn test_chunks_round_trip() {
        let bytes = minimal_png();
        let chunks = read_chunks(&bytes).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(write_chunks(&chunks), bytes);
    }

    #[test]
    fn test_corrupt_crc_is_rejected() {
        let mut bytes = minimal_png();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF; // flip a bit in IEND's CRC
        assert!(matches!(read_chunks(&bytes), Err(Error::Metadata(_))));
    }

    #[test]
    fn test_non_png_is_rejected() {
        assert!(read_chunks(b"GIF89a not a png").is_err());
    }

    #[test]
    fn test_xmp_chunk_sits_before_iend_and_is_replaced_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, minimal_png()).unwrap();

        write_xmp(&path, "<first/>").unwrap();
        write_xmp(&path, "<second/>").unwrap();

        let chunks = read_chunks(&std::fs::read(&path).unwrap()).unwrap();
        let xmp_count = chunks
            .iter()
            .filter(|c| c.itxt_keyword() == Some(XMP_KEYWORD))
            .count();
        assert_eq!(xmp_count, 1);

        // Placed immediately before the terminator chunk
        let xmp_index = chunks
            .iter()
            .position(|c| c.itxt_keyword() == Some(XMP_KEYWORD))
            .unwrap();
        assert!(chunks[xmp_index + 1].is_type(b"IEND"));

        assert_eq!(read_xmp(&path).unwrap().as_deref(), Some("<second/>"));
    }

    #[test]
    fn test_injected_png_still_parses_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, minimal_png()).unwrap();

        write_xmp(&path, "<packet/>").unwrap();

        // Every chunk, including the new one, must carry an exact CRC
        assert!(read_chunks(&std::fs::read(&path).unwrap()).is_ok());
    }
}
