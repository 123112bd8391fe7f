//! Content-coding removal for response bodies.
//!
//! Undoes `Content-Encoding` before any content-type interpretation. Unknown
//! codings and payloads that fail to decode are returned unmodified; the
//! response shaper never fails because of a coding. The only failure is a
//! decoded body growing past the caller's size limit.

use crate::config::LogLevel;
use crate::error::Error;
use bytes::Bytes;
use std::io::Read;

/// Internal buffer size for the brotli decompressor.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// A content coding this crate can undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Deflate,
    Brotli,
    Identity,
}

impl ContentCoding {
    /// Parse one coding token; `None` for codings we do not understand.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            "br" => Some(Self::Brotli),
            "identity" | "" => Some(Self::Identity),
            _ => None,
        }
    }

    /// Decode `input`, producing at most `cap` bytes.
    fn decode(self, input: &[u8], cap: u64) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::Gzip => {
                flate2::read::MultiGzDecoder::new(input)
                    .take(cap)
                    .read_to_end(&mut out)?;
            }
            Self::Deflate => {
                // "deflate" is zlib-wrapped per RFC 9110, but some servers send raw deflate
                if flate2::read::ZlibDecoder::new(input)
                    .take(cap)
                    .read_to_end(&mut out)
                    .is_err()
                {
                    out.clear();
                    flate2::read::DeflateDecoder::new(input)
                        .take(cap)
                        .read_to_end(&mut out)?;
                }
            }
            Self::Brotli => {
                brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE)
                    .take(cap)
                    .read_to_end(&mut out)?;
            }
            Self::Identity => {
                input.take(cap).read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }
}

/// Result of undoing codings under a byte cap.
struct Decoded {
    bytes: Bytes,
    /// A stage produced `cap` bytes and was cut off there
    truncated: bool,
}

/// Remove the codings listed in a `Content-Encoding` value.
///
/// Codings are applied in listed order by the sender, so they are undone in
/// reverse. Decoding stops at the first unknown or failing coding and the
/// bytes decoded so far are returned. No size limit applies; see
/// [`decode_body_limited`] for bodies from untrusted peers.
#[must_use]
pub fn decode_body(content_encoding: Option<&str>, body: Bytes, log_level: LogLevel) -> Bytes {
    undo_codings(content_encoding, body, u64::MAX, log_level).bytes
}

/// Like [`decode_body`], but never materializes more than `limit` decoded
/// bytes.
///
/// # Errors
///
/// Returns `Error::BodyTooLarge` once any decoding stage exceeds `limit`;
/// `actual` is the number of bytes decoded before stopping.
pub fn decode_body_limited(
    content_encoding: Option<&str>,
    body: Bytes,
    limit: usize,
    log_level: LogLevel,
) -> Result<Bytes, Error> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let decoded = undo_codings(content_encoding, body, cap, log_level);
    if decoded.truncated || decoded.bytes.len() > limit {
        return Err(Error::BodyTooLarge {
            limit,
            actual: decoded.bytes.len(),
        });
    }
    Ok(decoded.bytes)
}

fn undo_codings(
    content_encoding: Option<&str>,
    body: Bytes,
    cap: u64,
    log_level: LogLevel,
) -> Decoded {
    let mut current = Decoded {
        bytes: body,
        truncated: false,
    };
    let Some(content_encoding) = content_encoding else {
        return current;
    };
    if current.bytes.is_empty() {
        return current;
    }
    let warn = log_level.allows(LogLevel::Warn);

    for token in content_encoding.rsplit(',') {
        let Some(coding) = ContentCoding::from_token(token) else {
            if warn {
                tracing::warn!(
                    content_encoding = %content_encoding,
                    coding = token.trim(),
                    "unsupported content encoding; passing body through"
                );
            }
            return current;
        };
        if coding == ContentCoding::Identity {
            continue;
        }
        match coding.decode(&current.bytes, cap) {
            Ok(decoded) => {
                let truncated = u64::try_from(decoded.len()).unwrap_or(u64::MAX) >= cap;
                current = Decoded {
                    bytes: Bytes::from(decoded),
                    truncated,
                };
                if truncated {
                    return current;
                }
            }
            Err(e) => {
                if warn {
                    tracing::warn!(
                        error = %e,
                        coding = token.trim(),
                        "failed to decode response body; passing it through"
                    );
                }
                return current;
            }
        }
    }
    current
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tracing_test::traced_test;

    pub(crate) fn gzip_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn raw_deflate_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn brotli_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = brotli::CompressorWriter::new(Vec::new(), BROTLI_BUFFER_SIZE, 5, 22);
        encoder.write_all(data).unwrap();
        encoder.into_inner()
    }

    const ORIGINAL: &[u8] = b"Hello, this body travels compressed and arrives intact!";

    #[test]
    fn test_gzip() {
        let body = Bytes::from(gzip_compress(ORIGINAL));
        assert_eq!(decode_body(Some("gzip"), body, LogLevel::Info).as_ref(), ORIGINAL);
    }

    #[test]
    fn test_x_gzip_alias_and_case() {
        let body = Bytes::from(gzip_compress(ORIGINAL));
        assert_eq!(decode_body(Some(" X-GZIP "), body, LogLevel::Info).as_ref(), ORIGINAL);
    }

    #[test]
    fn test_deflate_zlib_wrapped() {
        let body = Bytes::from(zlib_compress(ORIGINAL));
        assert_eq!(decode_body(Some("deflate"), body, LogLevel::Info).as_ref(), ORIGINAL);
    }

    #[test]
    fn test_deflate_raw_fallback() {
        let body = Bytes::from(raw_deflate_compress(ORIGINAL));
        assert_eq!(decode_body(Some("deflate"), body, LogLevel::Info).as_ref(), ORIGINAL);
    }

    #[test]
    fn test_brotli() {
        let body = Bytes::from(brotli_compress(ORIGINAL));
        assert_eq!(decode_body(Some("br"), body, LogLevel::Info).as_ref(), ORIGINAL);
    }

    #[test]
    fn test_stacked_codings_undone_in_reverse() {
        // Sender applied gzip first, then br
        let body = Bytes::from(brotli_compress(&gzip_compress(ORIGINAL)));
        assert_eq!(decode_body(Some("gzip, br"), body, LogLevel::Info).as_ref(), ORIGINAL);
    }

    #[test]
    fn test_unknown_coding_passes_through() {
        let body = Bytes::from_static(b"opaque");
        assert_eq!(decode_body(Some("compress"), body.clone(), LogLevel::Info), body);
    }

    #[test]
    fn test_corrupt_payload_passes_through() {
        let body = Bytes::from_static(b"definitely not gzip");
        assert_eq!(decode_body(Some("gzip"), body.clone(), LogLevel::Info), body);
    }

    #[test]
    fn test_no_encoding_or_empty_body() {
        let body = Bytes::from_static(b"plain");
        assert_eq!(decode_body(None, body.clone(), LogLevel::Info), body);
        assert!(decode_body(Some("gzip"), Bytes::new(), LogLevel::Info).is_empty());
        assert_eq!(decode_body(Some("identity"), body.clone(), LogLevel::Info), body);
    }

    #[test]
    fn test_limited_decode_within_limit() {
        let body = Bytes::from(gzip_compress(ORIGINAL));
        let decoded = decode_body_limited(Some("gzip"), body, ORIGINAL.len(), LogLevel::Info);
        assert_eq!(decoded.unwrap().as_ref(), ORIGINAL);
    }

    #[test]
    fn test_limited_decode_stops_at_limit() {
        // 8 MiB of 'a' compresses to a few kilobytes
        let inflated = vec![b'a'; 8 * 1024 * 1024];
        let compressed = gzip_compress(&inflated);
        let limit = 64 * 1024;
        assert!(compressed.len() < limit);

        let result =
            decode_body_limited(Some("gzip"), Bytes::from(compressed), limit, LogLevel::Info);
        match result {
            Err(Error::BodyTooLarge { limit: l, actual }) => {
                assert_eq!(l, limit);
                assert_eq!(actual, limit + 1);
            }
            other => panic!("expected BodyTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_limited_decode_applies_to_every_stage() {
        let inflated = vec![b'z'; 1024 * 1024];
        let body = Bytes::from(brotli_compress(&gzip_compress(&inflated)));
        let result = decode_body_limited(Some("gzip, br"), body, 4096, LogLevel::Info);
        assert!(matches!(result, Err(Error::BodyTooLarge { limit: 4096, .. })));
    }

    #[test]
    fn test_limited_decode_of_plain_body() {
        let body = Bytes::from_static(b"0123456789");
        assert!(decode_body_limited(None, body.clone(), 10, LogLevel::Info).is_ok());
        assert!(matches!(
            decode_body_limited(Some("identity"), body, 4, LogLevel::Info),
            Err(Error::BodyTooLarge { limit: 4, .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_warnings_follow_log_level() {
        let body = Bytes::from_static(b"opaque");
        decode_body(Some("compress"), body.clone(), LogLevel::Error);
        assert!(!logs_contain("unsupported content encoding"));

        decode_body(Some("compress"), body, LogLevel::Warn);
        assert!(logs_contain("unsupported content encoding"));
    }
}
