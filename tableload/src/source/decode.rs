//! Byte decoding with encoding detection.

use encoding_rs::Encoding;
use tracing::debug;

use crate::error::{SourceError, SourceResult};

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes into UTF-8 text.
///
/// With `forced` set, that label is used and must be known to encoding_rs.
/// Otherwise the encoding is detected, falling back to lossy UTF-8 for
/// labels encoding_rs does not know. A leading BOM is dropped.
pub fn decode(bytes: &[u8], forced: Option<&str>) -> SourceResult<String> {
    let encoding = match forced {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| SourceError::Encoding(format!("unknown encoding `{}`", label)))?,
        None => {
            let label = detect_encoding(bytes);
            match Encoding::for_label(label.as_bytes()) {
                Some(encoding) => encoding,
                None => {
                    debug!(label = %label, "unsupported detected encoding, using utf-8");
                    encoding_rs::UTF_8
                }
            }
        }
    };

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "replaced malformed sequences while decoding");
    }
    Ok(text.into_owned())
}
