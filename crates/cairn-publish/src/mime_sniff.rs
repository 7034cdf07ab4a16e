//! Magic-byte MIME detection. File extensions are never consulted; the
//! sniffer reads the header and matches it against a bundled signature
//! table, returning only the primary `type/subtype` pair.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SniffError {
    #[error("failed to read '{path}' for sniffing: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stage buffer in a scratch file: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("no known signature matched the file header")]
    UnknownSignature,
}

const HEADER_LEN: usize = 512;

// (signature bytes, offset into the header, mime). Checked in order; the
// container formats with offsets sit above the short, weak prefixes.
const SIGNATURES: &[(&[u8], usize, &str)] = &[
    (b"\x89PNG\r\n\x1a\n", 0, "image/png"),
    (b"\xff\xd8\xff", 0, "image/jpeg"),
    (b"GIF87a", 0, "image/gif"),
    (b"GIF89a", 0, "image/gif"),
    (b"WEBP", 8, "image/webp"),
    (b"WAVE", 8, "audio/wav"),
    (b"ftyp", 4, "video/mp4"),
    (b"\x1a\x45\xdf\xa3", 0, "video/webm"),
    (b"OggS", 0, "audio/ogg"),
    (b"II*\x00", 0, "image/tiff"),
    (b"MM\x00*", 0, "image/tiff"),
    (b"%PDF", 0, "application/pdf"),
    (b"\x1f\x8b", 0, "application/gzip"),
    (b"PK\x03\x04", 0, "application/zip"),
    (b"\x00\x00\x01\x00", 0, "image/x-icon"),
    (b"BM", 0, "image/bmp"),
];

/// Sniffs the MIME type of the file at `path` from its magic bytes.
pub fn detect_path(path: &Path) -> Result<String, SniffError> {
    let mut file = File::open(path).map_err(|source| SniffError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut header = vec![0_u8; HEADER_LEN];
    let mut filled = 0;
    loop {
        let read = file
            .read(&mut header[filled..])
            .map_err(|source| SniffError::Read {
                path: path.display().to_string(),
                source,
            })?;
        if read == 0 {
            break;
        }
        filled += read;
        if filled == header.len() {
            break;
        }
    }
    header.truncate(filled);
    detect_header(&header)
}

/// Sniffs an in-memory buffer. Magic-byte detection works against a
/// seekable file, so the buffer is first persisted to a scratch file.
pub fn detect_buffer(bytes: &[u8]) -> Result<String, SniffError> {
    let mut scratch = tempfile::NamedTempFile::new().map_err(SniffError::Scratch)?;
    std::io::Write::write_all(&mut scratch, bytes).map_err(SniffError::Scratch)?;
    std::io::Write::flush(&mut scratch).map_err(SniffError::Scratch)?;
    detect_path(scratch.path())
}

fn detect_header(header: &[u8]) -> Result<String, SniffError> {
    for (signature, offset, mime) in SIGNATURES {
        let end = offset + signature.len();
        if header.len() >= end && &header[*offset..end] == *signature {
            return Ok((*mime).to_string());
        }
    }
    if looks_like_svg(header) {
        return Ok("image/svg+xml".to_string());
    }
    Err(SniffError::UnknownSignature)
}

// SVG has no binary magic; accept a document that opens with an XML
// prolog or an `<svg` root after optional BOM and whitespace.
fn looks_like_svg(header: &[u8]) -> bool {
    let text = match std::str::from_utf8(header) {
        Ok(text) => text,
        Err(error) if error.valid_up_to() > 0 => match std::str::from_utf8(&header[..error.valid_up_to()]) {
            Ok(text) => text,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("<svg") {
        return true;
    }
    trimmed.starts_with("<?xml") && trimmed.contains("<svg")
}
