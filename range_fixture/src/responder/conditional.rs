//! Conditional request evaluation: `If-Match`, `If-None-Match`, `If-Modified-Since`,
//! `If-Unmodified-Since` and `If-Range`.

use axum::http::header::{IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE, RANGE};
use axum::http::{HeaderMap, HeaderName, Method};
use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_DATE: &str = "%a %b %e %H:%M:%S %Y";

/// Formats a timestamp as an HTTP date (IMF-fixdate).
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format(IMF_FIXDATE).to_string()
}

/// Parses an HTTP date in any of the three formats allowed by RFC 7231.
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    [IMF_FIXDATE, RFC850_DATE, ASCTIME_DATE]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|t| t.and_utc())
}

/// The validators of the representation being served.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Validators<'a> {
    /// Modification time, already truncated to whole seconds.
    pub modified: Option<DateTime<Utc>>,
    pub etag: Option<&'a str>,
}

/// Result of evaluating the request preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Precondition {
    Proceed { honor_range: bool },
    NotModified,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cond {
    None,
    True,
    False,
}

fn header<'h>(headers: &'h HeaderMap, name: &HeaderName) -> &'h str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

fn is_get_or_head(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Scans the first entity tag off `s`, returning it and the unparsed remainder.
fn scan_etag(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_matches(|c: char| c.is_ascii_whitespace());
    let start = if s.starts_with("W/") { 2 } else { 0 };
    let bytes = s.as_bytes();
    if bytes.len() < start + 2 || bytes[start] != b'"' {
        return None;
    }

    for (i, &c) in bytes.iter().enumerate().skip(start + 1) {
        match c {
            b'"' => return Some((&s[..i + 1], &s[i + 1..])),
            0x21 | 0x23..=0x7e | 0x80..=0xff => {},
            _ => return None,
        }
    }
    None
}

fn etag_strong_match(a: &str, b: &str) -> bool {
    a == b && a.starts_with('"')
}

fn etag_weak_match(a: &str, b: &str) -> bool {
    a.strip_prefix("W/").unwrap_or(a) == b.strip_prefix("W/").unwrap_or(b)
}

/// Walks a comma separated entity-tag list, returning `on_star` for `*` and
/// `on_match` as soon as `matches` accepts a tag.
fn eval_etag_list(list: &str, on_star: Cond, on_match: Cond, matches: impl Fn(&str) -> bool) -> Option<Cond> {
    let mut rest = list;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        if rest.is_empty() {
            return None;
        }
        if let Some(r) = rest.strip_prefix(',') {
            rest = r;
            continue;
        }
        if rest.starts_with('*') {
            return Some(on_star);
        }
        let (etag, remain) = scan_etag(rest)?;
        if matches(etag) {
            return Some(on_match);
        }
        rest = remain;
    }
}

fn check_if_match(headers: &HeaderMap, etag: Option<&str>) -> Cond {
    let im = header(headers, &IF_MATCH);
    if im.is_empty() {
        return Cond::None;
    }
    let current = etag.unwrap_or("");
    eval_etag_list(im, Cond::True, Cond::True, |e| etag_strong_match(e, current)).unwrap_or(Cond::False)
}

fn check_if_none_match(headers: &HeaderMap, etag: Option<&str>) -> Cond {
    let inm = header(headers, &IF_NONE_MATCH);
    if inm.is_empty() {
        return Cond::None;
    }
    let current = etag.unwrap_or("");
    eval_etag_list(inm, Cond::False, Cond::False, |e| etag_weak_match(e, current)).unwrap_or(Cond::True)
}

fn check_if_unmodified_since(headers: &HeaderMap, modified: Option<DateTime<Utc>>) -> Cond {
    let ius = header(headers, &IF_UNMODIFIED_SINCE);
    let (Some(modified), false) = (modified, ius.is_empty()) else {
        return Cond::None;
    };
    match parse_http_date(ius) {
        Some(t) if modified <= t => Cond::True,
        Some(_) => Cond::False,
        None => Cond::None,
    }
}

fn check_if_modified_since(method: &Method, headers: &HeaderMap, modified: Option<DateTime<Utc>>) -> Cond {
    if !is_get_or_head(method) {
        return Cond::None;
    }
    let ims = header(headers, &IF_MODIFIED_SINCE);
    let (Some(modified), false) = (modified, ims.is_empty()) else {
        return Cond::None;
    };
    match parse_http_date(ims) {
        Some(t) if modified <= t => Cond::False,
        Some(_) => Cond::True,
        None => Cond::None,
    }
}

fn check_if_range(method: &Method, headers: &HeaderMap, validators: &Validators) -> Cond {
    if !is_get_or_head(method) {
        return Cond::None;
    }
    let ir = header(headers, &IF_RANGE);
    if ir.is_empty() {
        return Cond::None;
    }

    if let Some((etag, _)) = scan_etag(ir) {
        return match validators.etag {
            Some(current) if etag_strong_match(etag, current) => Cond::True,
            _ => Cond::False,
        };
    }

    // The validator is a date: it must name exactly the modification second.
    match (validators.modified, parse_http_date(ir)) {
        (Some(modified), Some(t)) if modified.timestamp() == t.timestamp() => Cond::True,
        _ => Cond::False,
    }
}

/// Evaluates the request preconditions in RFC 7232 order.
pub(crate) fn check_preconditions(method: &Method, headers: &HeaderMap, validators: &Validators) -> Precondition {
    let mut ch = check_if_match(headers, validators.etag);
    if ch == Cond::None {
        ch = check_if_unmodified_since(headers, validators.modified);
    }
    if ch == Cond::False {
        return Precondition::Failed;
    }

    match check_if_none_match(headers, validators.etag) {
        Cond::False => {
            return if is_get_or_head(method) {
                Precondition::NotModified
            } else {
                Precondition::Failed
            };
        },
        Cond::None => {
            if check_if_modified_since(method, headers, validators.modified) == Cond::False {
                return Precondition::NotModified;
            }
        },
        Cond::True => {},
    }

    let honor_range = !headers.contains_key(RANGE) || check_if_range(method, headers, validators) != Cond::False;
    Precondition::Proceed { honor_range }
}
