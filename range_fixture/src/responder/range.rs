//! Parsing of the `Range` request header (bytes unit only).

use std::cmp::min;

use thiserror::Error;

/// A satisfiable byte range, `start` inclusive, `length` bytes long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRange {
    pub start: u64,
    pub length: u64,
}

impl HttpRange {
    /// The `Content-Range` value for this range of a resource of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.start + self.length - 1, size)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid range")]
    Invalid,

    #[error("invalid range: failed to overlap")]
    NoOverlap,
}

const RANGE_PREFIX: &str = "bytes=";

fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

fn parse_pos(s: &str) -> Result<u64, RangeError> {
    s.parse::<u64>().map_err(|_| RangeError::Invalid)
}

/// Parses a `Range` header value against a resource of `size` bytes.
///
/// Supports the forms of RFC 7233:
/// - `bytes=0-499` - the first 500 bytes (an end past the resource is clamped)
/// - `bytes=500-` - from byte 500 to the end
/// - `bytes=-500` - the last 500 bytes
/// - comma separated lists of the above
///
/// Ranges starting at or after `size` are dropped. If every range was dropped the
/// result is [`RangeError::NoOverlap`]. An empty header yields no ranges.
pub fn parse_ranges(header: &str, size: u64) -> Result<Vec<HttpRange>, RangeError> {
    if header.is_empty() {
        return Ok(Vec::new());
    }

    let Some(spec) = header.strip_prefix(RANGE_PREFIX) else {
        return Err(RangeError::Invalid);
    };

    let mut ranges = Vec::new();
    let mut no_overlap = false;

    for part in spec.split(',') {
        let part = trim(part);
        if part.is_empty() {
            continue;
        }

        let Some((start, end)) = part.split_once('-') else {
            return Err(RangeError::Invalid);
        };
        let (start, end) = (trim(start), trim(end));

        if start.is_empty() {
            // Suffix range: the last `end` bytes.
            if end.is_empty() || end.starts_with('-') {
                return Err(RangeError::Invalid);
            }
            let suffix = min(parse_pos(end)?, size);
            if suffix == 0 {
                no_overlap = true;
                continue;
            }
            ranges.push(HttpRange {
                start: size - suffix,
                length: suffix,
            });
        } else {
            let start = parse_pos(start)?;
            if start >= size {
                no_overlap = true;
                continue;
            }

            let length = if end.is_empty() {
                size - start
            } else {
                let end = parse_pos(end)?;
                if start > end {
                    return Err(RangeError::Invalid);
                }
                min(end, size - 1) - start + 1
            };
            ranges.push(HttpRange { start, length });
        }
    }

    if no_overlap && ranges.is_empty() {
        return Err(RangeError::NoOverlap);
    }

    Ok(ranges)
}

/// Total number of bytes covered by `ranges`, overlaps counted twice.
pub fn sum_ranges_size(ranges: &[HttpRange]) -> u64 {
    ranges.iter().map(|r| r.length).sum()
}
