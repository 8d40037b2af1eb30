//! JPEG APP1/XMP segment reader/writer.
//!
//! JPEG's defined home for XMP is an APP1 marker segment whose payload
//! opens with the XMP namespace URI. Not every file has one, so the
//! writer creates the segment when absent; an existing XMP APP1 is
//! replaced, never duplicated.

use std::path::Path;

use crate::error::{Error, Result};

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

/// Namespace header opening an XMP APP1 payload
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Marker payload limit: u16 length minus the two length bytes
const MAX_PAYLOAD: usize = 0xFFFF - 2;

/// One marker segment from the JPEG header area
#[derive(Debug, Clone)]
struct Segment {
    marker: u8,
    payload: Vec<u8>,
}

impl Segment {
    fn is_xmp(&self) -> bool {
        self.marker == APP1 && self.payload.starts_with(XMP_HEADER)
    }
}

/// Split a JPEG into its header segments and the untouched remainder
///
/// The remainder starts at the SOS (or EOI) marker; scan data after
/// SOS is copied verbatim on write, so it never needs parsing.
fn parse_header(bytes: &[u8]) -> Result<(Vec<Segment>, usize)> {
    if bytes.len() < 2 || bytes[..2] != SOI {
        return Err(Error::Metadata("Not a JPEG file".to_string()));
    }

    let mut segments = Vec::new();
    let mut offset = 2;

    loop {
        if offset + 2 > bytes.len() {
            return Err(Error::Metadata("Truncated JPEG header".to_string()));
        }
        if bytes[offset] != 0xFF {
            return Err(Error::Metadata("Malformed JPEG marker".to_string()));
        }
        let marker = bytes[offset + 1];

        if marker == SOS || marker == EOI {
            return Ok((segments, offset));
        }

        if offset + 4 > bytes.len() {
            return Err(Error::Metadata("Truncated JPEG segment".to_string()));
        }
        let length =
            u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if length < 2 || offset + 2 + length > bytes.len() {
            return Err(Error::Metadata("Bad JPEG segment length".to_string()));
        }

        segments.push(Segment {
            marker,
            payload: bytes[offset + 4..offset + 2 + length].to_vec(),
        });
        offset += 2 + length;
    }
}

fn serialize(segments: &[Segment], tail: &[u8]) -> Vec<u8> {
    let total: usize = segments.iter().map(|s| s.payload.len() + 4).sum();
    let mut out = Vec::with_capacity(2 + total + tail.len());
    out.extend_from_slice(&SOI);
    for segment in segments {
        out.push(0xFF);
        out.push(segment.marker);
        out.extend_from_slice(&((segment.payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&segment.payload);
    }
    out.extend_from_slice(tail);
    out
}

/// Index right after the leading APP0/JFIF and Exif APP1 segments,
/// where mainstream readers expect the XMP segment
fn insertion_index(segments: &[Segment]) -> usize {
    let mut index = 0;
    for segment in segments {
        let is_leading = segment.marker == APP0
            || (segment.marker == APP1 && segment.payload.starts_with(EXIF_HEADER));
        if !is_leading {
            break;
        }
        index += 1;
    }
    index
}

/// Write (or replace) the XMP APP1 segment in a JPEG file
pub fn write_xmp(path: &Path, packet: &str) -> Result<()> {
    if XMP_HEADER.len() + packet.len() > MAX_PAYLOAD {
        return Err(Error::Metadata(
            "XMP packet too large for a JPEG APP1 segment".to_string(),
        ));
    }

    let bytes = std::fs::read(path)?;
    let (mut segments, tail_start) = parse_header(&bytes)?;

    segments.retain(|s| !s.is_xmp());

    let mut payload = Vec::with_capacity(XMP_HEADER.len() + packet.len());
    payload.extend_from_slice(XMP_HEADER);
    payload.extend_from_slice(packet.as_bytes());

    let index = insertion_index(&segments);
    segments.insert(
        index,
        Segment {
            marker: APP1,
            payload,
        },
    );

    std::fs::write(path, serialize(&segments, &bytes[tail_start..]))?;
    Ok(())
}

/// The XMP packet currently embedded in a JPEG file, if any
pub fn read_xmp(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    let (segments, _) = parse_header(&bytes)?;

    for segment in &segments {
        if segment.is_xmp() {
            let text =
                String::from_utf8_lossy(&segment.payload[XMP_HEADER.len()..]).into_owned();
            return Ok(Some(text));
        }
    }

    Ok(None)
}

// -- Tests --
