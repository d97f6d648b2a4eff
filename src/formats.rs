//! Lexical rules for the names, keys, guids, versions and timestamps that
//! appear in project files and file names.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::{ErrorCode, Fault};

pub const REPLACEMENT_FILENAME_CHAR: char = '_';
pub const SEPARATOR_FILENAME_CHAR: char = '+';

/// Timestamp layout the storage layer writes, e.g. `Sat Feb 24 16:16:06 2024`.
pub const CANONICAL_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

// Formats accepted where any plausible timestamp will do. The canonical
// layout comes first; the rest cover the shapes other writers emit.
const LENIENT_DATETIME_FORMATS: &[&str] = &[
    CANONICAL_TIME_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d %b %Y %H:%M:%S",
];

fn version_regex() -> &'static Regex {
    static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
    VERSION_REGEX.get_or_init(|| {
        Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+[A-Za-z]*$").expect("Invalid version regex")
    })
}

/// The restricted set names and keys must stay inside.
fn is_basic_ccpn_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The wider set tolerated inside file names.
fn is_ccpn_filename_char(c: char) -> bool {
    is_basic_ccpn_char(c) || matches!(c, '-' | '.' | SEPARATOR_FILENAME_CHAR)
}

/// Replaces characters a top-object file name cannot carry.
pub fn sanitize_for_filename(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if is_ccpn_filename_char(c) {
                c
            } else {
                REPLACEMENT_FILENAME_CHAR
            }
        })
        .collect()
}

/// Splits a trailing `.suffix` off `value`.
///
/// A non-empty `suffixes` list restricts which suffixes split; anything else
/// is treated as part of the stem. A leading dot never counts as a suffix.
pub fn split_known_suffix<'a>(value: &'a str, suffixes: &[&str]) -> (&'a str, &'a str) {
    let (stem, suffix) = match value.rfind('.') {
        Some(pos) if pos > 0 => value.split_at(pos),
        _ => (value, ""),
    };
    if suffix.is_empty() || suffixes.is_empty() || suffixes.contains(&suffix) {
        (stem, suffix)
    } else {
        (value, "")
    }
}

fn letter_set_marker(stem: &str, suffix: &str, extras: &str) -> Option<String> {
    let mut clean = true;
    let mut pointers = String::with_capacity(stem.len() + suffix.len());
    for c in stem.chars() {
        if is_basic_ccpn_char(c) || extras.contains(c) {
            pointers.push('_');
        } else {
            pointers.push('^');
            clean = false;
        }
    }
    for _ in suffix.chars() {
        pointers.push('_');
    }
    if clean { None } else { Some(pointers) }
}

/// Checks a plain value (an exo-link key, say) against the restricted set.
///
/// Returns the pointer line marking the offending characters, or `None` when
/// the value is clean.
pub fn value_outside_letter_set(value: &str, extras: &str) -> Option<String> {
    letter_set_marker(value, "", extras)
}

/// Checks a file or directory name against the restricted set, ignoring a
/// recognised suffix. The pointer line pads underscores across the suffix so
/// it aligns under the full name.
pub fn filename_outside_letter_set(
    value: &str,
    extras: &str,
    suffixes: &[&str],
) -> Option<String> {
    let (stem, suffix) = split_known_suffix(value, suffixes);
    letter_set_marker(stem, suffix, extras)
}

/// Validates the canonical guid layout, reporting every violated rule.
///
/// The pipeline never rejects objects over this; historical guids in the
/// wild stray from the layout and still load.
pub fn validate_guid(guid: &str) -> Result<(), Fault> {
    let parts: Vec<&str> = guid.split('_').collect();

    let mut errors = Vec::new();
    if parts.len() != 4 {
        errors.push(format!(
            "there must be 4 parts separated by _s [found {}]",
            parts.len()
        ));
    } else {
        let is_alnum =
            |part: &str| !part.is_empty() && part.chars().all(char::is_alphanumeric);
        let is_digits =
            |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());

        if !is_alnum(parts[0]) {
            errors.push(format!("part 1 must be alphanumeric [found {}]", parts[0]));
        }
        if !is_alnum(parts[1]) {
            errors.push(format!("part 2 must be alphanumeric [found {}]", parts[1]));
        }

        let timestamp_parts: Vec<&str> = parts[2].split('-').collect();
        if timestamp_parts.len() != 6 {
            errors.push(format!(
                "part 3 must have 6 components separated by -s [found {}]",
                parts[2]
            ));
        }
        if !timestamp_parts.iter().all(|part| is_digits(part)) {
            errors.push(format!(
                "the components of part 3 must all be digits [found {}]",
                parts[2]
            ));
        }

        if !is_digits(parts[3]) {
            errors.push("part 4 must be digits".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Fault::with_messages(
            ErrorCode::BadGuidFormat,
            guid,
            errors,
        ))
    }
}

/// True for `<major>.<minor>.<patch>` where major and minor are digits and
/// patch is digits with optional trailing letters.
pub fn is_valid_version(version: &str) -> bool {
    version_regex().is_match(version)
}

/// True when the value matches [`CANONICAL_TIME_FORMAT`] exactly.
pub fn is_canonical_timestamp(value: &str) -> bool {
    NaiveDateTime::parse_from_str(value, CANONICAL_TIME_FORMAT).is_ok()
}

/// True when the value parses as a timestamp in any accepted layout.
pub fn is_parsable_timestamp(value: &str) -> bool {
    let value = value.trim();
    if LENIENT_DATETIME_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
    {
        return true;
    }
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return true;
    }
    chrono::DateTime::parse_from_rfc2822(value).is_ok()
        || chrono::DateTime::parse_from_rfc3339(value).is_ok()
}
