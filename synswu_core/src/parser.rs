/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::parser
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Turn the free-text `softwareupdate --list` listing into
    UpdateRecords, for both the pre-10.15 (Legacy) and the
    10.15+ (Modern) output layouts.

  Security / Safety Notes:
    Pure text processing; no I/O performed in this module.

  Dependencies:
    regex + lazy_static for the line patterns.

  Operational Scope:
    Fed by the execution driver's scrubbed list output; its
    records flow into shutdown disambiguation and filtering.

  Revision History:
    2025-11-09 COD  Unified Legacy and Modern listing parsers.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Malformed lines degrade per field, never abort a listing
    - Layout selected once by the caller, never re-probed here
============================================================*/

use lazy_static::lazy_static;
use regex::Regex;

use crate::update::UpdateRecord;

lazy_static! {
    // `* <label>`; leading whitespace is trimmed before matching.
    static ref HEADER_REGEX: Regex = Regex::new(r"^\*\s+(.*)$").unwrap();

    static ref LABEL_REGEX: Regex = Regex::new(r"^Label:\s*(.*)$").unwrap();

    // `<name>, <n>K <flags...>`
    static ref LEGACY_DETAILS_REGEX: Regex = Regex::new(r"^(.*), ([0-9]+)K\s?(.*)$").unwrap();

    // Start of each `Key: ` in a Modern details line.
    static ref MODERN_KEY_REGEX: Regex = Regex::new(r"(?:^|,\s*)([A-Z][a-z]+):\s*").unwrap();
}

/// Listing layout emitted by softwareupdate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVariant {
    /// macOS 10.14 and earlier: bare identifier headers, `name, sizeK flags` details.
    Legacy,
    /// macOS 10.15 and later: `Label:` headers, `Key: Value,` details.
    Modern,
}

/// Parse a scrubbed listing into records, in listing order.
///
/// Each header line consumes the line after it as its details. A header
/// without a following non-blank line produces nothing.
pub fn parse<S: AsRef<str>>(lines: &[S], variant: FormatVariant) -> Vec<UpdateRecord> {
    let mut records = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let Some(label) = header_label(line.as_ref()) else {
            continue;
        };
        let Some(details) = lines
            .get(index + 1)
            .map(|next| next.as_ref().trim())
            .filter(|next| !next.is_empty())
        else {
            continue;
        };

        let record = match variant {
            FormatVariant::Legacy => parse_legacy(label, details),
            FormatVariant::Modern => parse_modern(label, details),
        };
        if let Some(record) = record {
            records.push(record);
        }
    }
    records
}

fn header_label(line: &str) -> Option<&str> {
    let captures = HEADER_REGEX.captures(line.trim())?;
    let label = captures.get(1)?.as_str().trim();
    (!label.is_empty()).then_some(label)
}

fn parse_legacy(label: &str, details: &str) -> Option<UpdateRecord> {
    let record = UpdateRecord::new(label)?;
    let Some(parts) = LEGACY_DETAILS_REGEX.captures(details) else {
        return Some(record);
    };

    let name = parts.get(1).map_or("", |m| m.as_str());
    let size = parts.get(2).and_then(|m| parse_size_kib(m.as_str()));
    let flags = parts.get(3).map_or("", |m| m.as_str());

    let shutdown = flags.contains("halt") || flags.contains("shut down");
    let restart = flags.contains("restart") && !shutdown;

    Some(
        record
            .with_name(name)
            .with_size_kib(size)
            .with_recommended(flags.contains("recommended"))
            .with_restart(restart)
            .with_shutdown(shutdown),
    )
}

fn parse_modern(label: &str, details: &str) -> Option<UpdateRecord> {
    let id = LABEL_REGEX.captures(label)?.get(1)?.as_str();
    let mut record = UpdateRecord::new(id)?;

    for (key, value) in modern_pairs(details) {
        record = match key {
            "Title" => record.with_name(value),
            "Size" => record.with_size_kib(parse_size_kib(value)),
            "Recommended" => record.with_recommended(value == "YES"),
            "Action" => match value {
                "restart" => record.with_restart(true),
                "shut down" => record.with_restart(false).with_shutdown(true),
                _ => record,
            },
            _ => record,
        };
    }
    Some(record)
}

/// Split `Key: Value, Key: Value,` into pairs. Values may contain commas
/// as long as they are not followed by another `Key: `.
fn modern_pairs(details: &str) -> Vec<(&str, &str)> {
    let keys: Vec<_> = MODERN_KEY_REGEX.captures_iter(details).collect();
    let mut pairs = Vec::with_capacity(keys.len());
    for (position, captures) in keys.iter().enumerate() {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value_end = keys
            .get(position + 1)
            .and_then(|next| next.get(0))
            .map_or(details.len(), |next| next.start());
        let value = details[whole.end()..value_end]
            .trim()
            .trim_end_matches(',')
            .trim();
        pairs.push((key.as_str(), value));
    }
    pairs
}

/// Parse a `<n>` or `<n>K` size token into KiB.
pub fn parse_size_kib(token: &str) -> Option<u64> {
    let digits = token.trim();
    let digits = digits.strip_suffix('K').unwrap_or(digits).trim();
    digits.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &str) -> Vec<&str> {
        raw.lines().collect()
    }

    #[test]
    fn modern_listing_matches_reference_record() {
        let raw = "* Label: Safari14.1Update\nTitle: Safari, Size: 204800, Recommended: YES, Action: restart,";
        let records = parse(&lines(raw), FormatVariant::Modern);
        assert_eq!(records.len(), 1);
        let safari = &records[0];
        assert_eq!(safari.id(), "Safari14.1Update");
        assert_eq!(safari.display_name(), "Safari");
        assert_eq!(safari.size_kib(), Some(204800));
        assert!(safari.is_recommended());
        assert!(safari.is_restart());
        assert!(!safari.is_shutdown());
    }

    #[test]
    fn modern_listing_from_real_tool_output() {
        let raw = "Software Update found the following new or updated software:\n\
                   * Label: Command Line Tools for Xcode-12.5\n\
                   \tTitle: Command Line Tools for Xcode, Version: 12.5, Size: 470952K, Recommended: YES, \n\
                   * Label: macOS Big Sur 11.4-20F71\n\
                   \tTitle: macOS Big Sur, Version: 11.4, Size: 2953394K, Recommended: YES, Action: restart, \n\
                   * Label: Firmware-1.0\n\
                   \tTitle: Firmware, Version: 1.0, Size: 12K, Recommended: NO, Action: shut down,";
        let records = parse(&lines(raw), FormatVariant::Modern);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].id(), "Command Line Tools for Xcode-12.5");
        assert_eq!(records[0].size_kib(), Some(470952));
        assert!(!records[0].is_restart());

        assert_eq!(records[1].display_name(), "macOS Big Sur");
        assert!(records[1].is_restart());

        assert!(records[2].is_shutdown());
        assert!(!records[2].is_restart());
        assert!(!records[2].is_recommended());
    }

    #[test]
    fn header_without_following_line_is_skipped() {
        let raw = "* Label: First\nTitle: First, Size: 10K, Recommended: YES,\n* Label: Dangling";
        let records = parse(&lines(raw), FormatVariant::Modern);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "First");
    }

    #[test]
    fn header_followed_by_blank_line_is_skipped() {
        let records = parse(&["* Label: Lonely", "   "], FormatVariant::Modern);
        assert!(records.is_empty());
    }

    #[test]
    fn recommended_requires_exact_yes() {
        for value in ["NO", "yes", "Yes", ""] {
            let details = format!("Title: Thing, Recommended: {value},");
            let records = parse(&["* Label: Thing-1", details.as_str()], FormatVariant::Modern);
            assert!(!records[0].is_recommended(), "value {value:?}");
        }
        let records = parse(&["* Label: Thing-1", "Title: Thing,"], FormatVariant::Modern);
        assert!(!records[0].is_recommended());
    }

    #[test]
    fn modern_ignores_unknown_keys_and_tolerates_commas_in_titles() {
        let raw = ["* Label: Pro Apps-2", "Title: Pro Video Formats, Codecs, Version: 2.2, Build: 9A, Size: 3K,"];
        let records = parse(&raw, FormatVariant::Modern);
        assert_eq!(records[0].display_name(), "Pro Video Formats, Codecs");
        assert_eq!(records[0].size_kib(), Some(3));
    }

    #[test]
    fn modern_header_without_label_prefix_yields_nothing() {
        let records = parse(&["* Safari14.1Update", "Title: Safari,"], FormatVariant::Modern);
        assert!(records.is_empty());
    }

    #[test]
    fn malformed_modern_details_keep_the_label() {
        let records = parse(&["* Label: Odd-1", "garbage without keys"], FormatVariant::Modern);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "Odd-1");
        assert_eq!(records[0].display_name(), "Odd-1");
        assert_eq!(records[0].size_kib(), None);
    }

    #[test]
    fn legacy_details_line_sets_size_and_flags() {
        let records = parse(
            &["   * ExampleUpdate-1.0", "\tExample Update, 512K recommended restart"],
            FormatVariant::Legacy,
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id(), "ExampleUpdate-1.0");
        assert_eq!(record.display_name(), "Example Update");
        assert_eq!(record.size_kib(), Some(512));
        assert!(record.is_recommended());
        assert!(record.is_restart());
        assert!(!record.is_shutdown());
    }

    #[test]
    fn legacy_shutdown_cue_beats_restart() {
        let records = parse(
            &["* Firmware-2", "Firmware Update, 40K [restart] [halt]"],
            FormatVariant::Legacy,
        );
        assert!(records[0].is_shutdown());
        assert!(!records[0].is_restart());

        let records = parse(
            &["* Firmware-3", "Firmware Update, 40K [shut down]"],
            FormatVariant::Legacy,
        );
        assert!(records[0].is_shutdown());
    }

    #[test]
    fn legacy_size_without_k_suffix_stays_unknown() {
        let records = parse(&["* iTunes-12", "iTunes, 1024 recommended"], FormatVariant::Legacy);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "iTunes-12");
        assert_eq!(records[0].size_kib(), None);
        assert_eq!(records[0].display_name(), "iTunes-12");
        assert!(!records[0].is_recommended());
    }

    #[test]
    fn size_tokens() {
        assert_eq!(parse_size_kib("1024K"), Some(1024));
        assert_eq!(parse_size_kib("204800"), Some(204800));
        assert_eq!(parse_size_kib("0K"), Some(0));
        assert_eq!(parse_size_kib("big"), None);
        assert_eq!(parse_size_kib(""), None);
    }

    #[test]
    fn non_header_lines_are_ignored() {
        let raw = ["Software Update Tool", "Finding available software", "No new software available."];
        assert!(parse(&raw, FormatVariant::Legacy).is_empty());
        assert!(parse(&raw, FormatVariant::Modern).is_empty());
    }
}
