//! Listing parser
//!
//! Turns the line-oriented output of an archiver's "list" command into
//! [`ArchiveEntry`] records. Each backend describes its output with a
//! [`ListingFormat`]: a header line that marks the start of the listing, an
//! optional separator pattern bounding the body, and ordered [`ColumnRule`]s.

mod buffer;
mod column;
mod date;

use chrono::{Datelike, Local};
use regex::Regex;

use crate::entry::{ArchiveEntry, Field};
use crate::safety::{has_trailing_separator, sanitize_entry_path};

pub use buffer::LineBuffer;
pub use column::ColumnRule;
pub use date::{DateOrder, parse_timestamp, resolve_year};

/// Slots holding separate date components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateColumns {
    pub year: usize,
    pub month: usize,
    pub day: usize,
    pub time: usize,
}

/// Shape of one tool's listing output.
#[derive(Debug, Clone)]
pub struct ListingFormat {
    /// Literal text of the column header line
    pub header: String,
    /// Rule line opening and closing the body, if the tool prints one
    pub separator: Option<Regex>,
    /// Preamble lines that are tool banners rather than archive comment
    pub banners: Vec<Regex>,
    pub rules: Vec<ColumnRule>,
    pub date_order: DateOrder,
    /// Explicit date component slots; take precedence over a timestamp column
    pub date_columns: Option<DateColumns>,
}

/// Classification of a single output line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Entry(ArchiveEntry),
    /// Line before the header; status text, never data
    Preamble(String),
    /// Header, separators, blank lines and trailer
    Ignored,
    /// Body line that did not fit the column rules
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Preamble,
    AwaitingBody,
    Body,
    Trailer,
}

/// Stateful parser for one listing run.
pub struct ColumnParser<'a> {
    format: &'a ListingFormat,
    phase: Phase,
    reference_year: i32,
    slot_count: usize,
    comment: Vec<String>,
}

impl<'a> ColumnParser<'a> {
    pub fn new(format: &'a ListingFormat) -> Self {
        let slot_count = format
            .rules
            .iter()
            .map(|r| r.column + 1)
            .chain(format.date_columns.iter().flat_map(|d| {
                [d.year, d.month, d.day, d.time].map(|c| c + 1)
            }))
            .max()
            .unwrap_or(0);

        Self {
            format,
            phase: Phase::Preamble,
            reference_year: Local::now().year(),
            slot_count,
            comment: Vec::new(),
        }
    }

    /// Pin the year two-digit years are resolved against.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn header_seen(&self) -> bool {
        self.phase != Phase::Preamble
    }

    pub fn parse_line(&mut self, line: &str) -> LineOutcome {
        match self.phase {
            Phase::Preamble => {
                if line.contains(self.format.header.trim()) {
                    self.phase = if self.format.separator.is_some() {
                        Phase::AwaitingBody
                    } else {
                        Phase::Body
                    };
                    return LineOutcome::Ignored;
                }
                if !self.format.banners.iter().any(|b| b.is_match(line)) {
                    self.comment.push(line.trim_end().to_string());
                }
                LineOutcome::Preamble(line.to_string())
            }
            Phase::AwaitingBody => {
                if self.is_separator(line) {
                    self.phase = Phase::Body;
                }
                LineOutcome::Ignored
            }
            Phase::Body => {
                if self.is_separator(line) {
                    self.phase = Phase::Trailer;
                    return LineOutcome::Ignored;
                }
                if line.trim().is_empty() {
                    return LineOutcome::Ignored;
                }
                match self.parse_row(line) {
                    Ok(entry) => LineOutcome::Entry(entry),
                    Err(reason) => LineOutcome::Malformed(reason),
                }
            }
            Phase::Trailer => LineOutcome::Ignored,
        }
    }

    /// Non-banner preamble text, with surrounding blank lines removed.
    pub fn comment(&self) -> Option<String> {
        let start = self.comment.iter().position(|l| !l.trim().is_empty())?;
        let end = self.comment.iter().rposition(|l| !l.trim().is_empty())?;
        Some(self.comment[start..=end].join("\n"))
    }

    fn is_separator(&self, line: &str) -> bool {
        self.format
            .separator
            .as_ref()
            .is_some_and(|sep| sep.is_match(line))
    }

    fn parse_row(&self, line: &str) -> Result<ArchiveEntry, String> {
        let mut slots: Vec<Option<&str>> = vec![None; self.slot_count];
        let mut cursor = 0;

        for rule in &self.format.rules {
            match rule.extract(line, cursor) {
                Some((text, next)) => {
                    slots[rule.column] = Some(text);
                    cursor = next;
                }
                None if rule.optional => {}
                None => return Err(format!("no {:?} column", rule.field)),
            }
        }

        let mut raw_name = None;
        let mut size = 0;
        let mut compressed_size = None;
        let mut ratio = None;
        let mut attributes = "";
        let mut timestamp_text = None;

        for rule in &self.format.rules {
            let Some(text) = slots[rule.column] else {
                continue;
            };
            match rule.field {
                Field::FileName => raw_name = Some(text),
                Field::Size => size = parse_number(text)?,
                Field::CompressedSize => compressed_size = Some(parse_number(text)?),
                Field::CompressionRatio => ratio = Some(parse_percent(text)?),
                Field::Attributes => attributes = text,
                Field::Timestamp => timestamp_text = Some(text),
                Field::Year | Field::Month | Field::Day | Field::Time => {}
            }
        }

        let raw_name = raw_name.ok_or_else(|| "no file name".to_string())?;
        let full_path = sanitize_entry_path(raw_name)
            .ok_or_else(|| format!("unusable file name {raw_name:?}"))?;

        let is_dir = has_trailing_separator(raw_name)
            || attributes.starts_with('d')
            || attributes.contains('D');

        let mut entry = ArchiveEntry::with_internal_id(full_path, raw_name.to_string(), is_dir, size);
        entry.is_link = attributes.starts_with('l');
        entry.compressed_size = compressed_size;
        entry.ratio = ratio;
        entry.timestamp = match self.format.date_columns {
            Some(cols) => self.timestamp_from_columns(&slots, cols),
            None => timestamp_text.and_then(|t| {
                parse_timestamp(t, self.format.date_order, self.reference_year)
            }),
        };
        if entry.timestamp.is_none() {
            log::debug!("no usable timestamp for {:?}", entry.internal_id);
        }

        Ok(entry)
    }

    fn timestamp_from_columns(
        &self,
        slots: &[Option<&str>],
        cols: DateColumns,
    ) -> Option<chrono::NaiveDateTime> {
        let slot = |i: usize| slots.get(i).copied().flatten();
        let date = date::from_components(
            slot(cols.year)?,
            slot(cols.month)?,
            slot(cols.day)?,
            self.reference_year,
        )?;
        let time = match slot(cols.time) {
            Some(t) => date::parse_time(t)?,
            None => chrono::NaiveTime::MIN,
        };
        Some(date.and_time(time))
    }
}

fn parse_number(text: &str) -> Result<u64, String> {
    u64::from_str_radix(text.trim(), 10).map_err(|e| format!("bad number {text:?}: {e}"))
}

fn parse_percent(text: &str) -> Result<f32, String> {
    let digits = text.trim().trim_end_matches('%');
    digits
        .parse::<f32>()
        .map_err(|e| format!("bad ratio {text:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ace_like() -> ListingFormat {
        ListingFormat {
            header: "Date    Time Packed     Size     RatioFile".into(),
            separator: None,
            banners: vec![Regex::new(r"^UNACE").unwrap()],
            rules: vec![
                ColumnRule::new(7, Field::Day, r"[0-3][0-9]").width(2),
                ColumnRule::new(6, Field::Month, r"[01][0-9]").width(2),
                ColumnRule::new(5, Field::Year, r"[0-9][0-9]").width(4),
                ColumnRule::new(8, Field::Time, r"[0-9:]+").width(8),
                ColumnRule::new(2, Field::CompressedSize, r"[0-9]+"),
                ColumnRule::new(1, Field::Size, r"[0-9]+"),
                ColumnRule::new(9, Field::CompressionRatio, r"[0-9]+%"),
                ColumnRule::new(0, Field::FileName, r"\S"),
            ],
            date_order: DateOrder::DayMonthYear,
            date_columns: Some(DateColumns {
                year: 5,
                month: 6,
                day: 7,
                time: 8,
            }),
        }
    }

    fn unix_like() -> ListingFormat {
        ListingFormat {
            header: "Attributes      Size     Date    Time   Name".into(),
            separator: Some(Regex::new(r"^-{5,}[\s-]*$").unwrap()),
            banners: vec![],
            rules: vec![
                ColumnRule::new(0, Field::Attributes, r"\S+"),
                ColumnRule::new(1, Field::Size, r"\S+"),
                ColumnRule::new(2, Field::Timestamp, r"\d{2,4}-\d{2}-\d{2,4}\s+\d{2}:\d{2}"),
                ColumnRule::new(3, Field::FileName, r"\S"),
            ],
            date_order: DateOrder::DayMonthYear,
            date_columns: None,
        }
    }

    fn parse_all(format: &ListingFormat, text: &str) -> Vec<LineOutcome> {
        let mut parser = ColumnParser::new(format).with_reference_year(2024);
        text.lines().map(|l| parser.parse_line(l)).collect()
    }

    fn entries(outcomes: &[LineOutcome]) -> Vec<&ArchiveEntry> {
        outcomes
            .iter()
            .filter_map(|o| match o {
                LineOutcome::Entry(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ace_row_with_two_digit_year() {
        let format = ace_like();
        let text = "UNACE v2.5\n\
                    Date    Time Packed     Size     RatioFile\n\
                    15.01.05 10:30     40      100   40%  docs/read me.txt\n";
        let outcomes = parse_all(&format, text);
        let found = entries(&outcomes);
        assert_eq!(found.len(), 1);

        let e = found[0];
        assert_eq!(e.full_path, "docs/read me.txt");
        assert_eq!(e.size, 100);
        assert_eq!(e.compressed_size, Some(40));
        assert_eq!(e.ratio, Some(40.0));
        let expected = NaiveDate::from_ymd_opt(2005, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(e.timestamp, Some(expected));
    }

    #[test]
    fn test_lines_before_header_are_not_entries() {
        let format = ace_like();
        let text = "15.01.05 10:30     40      100   40%  sneaky.txt\n\
                    Date    Time Packed     Size     RatioFile\n";
        let outcomes = parse_all(&format, text);
        assert!(entries(&outcomes).is_empty());
        assert!(matches!(outcomes[0], LineOutcome::Preamble(_)));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let format = unix_like();
        let line = " -rw-r--r--       123  2024-01-15 10:30  a b/c.txt";
        let mut parser = ColumnParser::new(&format).with_reference_year(2024);
        parser.parse_line("Attributes      Size     Date    Time   Name");
        parser.parse_line("----------- ---------  ---------- -----  ----");
        let first = parser.parse_line(line);
        let second = parser.parse_line(line);
        assert_eq!(first, second);
        assert!(matches!(first, LineOutcome::Entry(_)));
    }

    #[test]
    fn test_trailing_separator_marks_directory() {
        let format = unix_like();
        let text = "Attributes      Size     Date    Time   Name\n\
                    ----------- ---------  ---------- -----  ----\n \
                    -rw-r--r--         0  2024-01-15 10:30  photos/\n\
                    ----------- ---------  ---------- -----  ----\n";
        let outcomes = parse_all(&format, text);
        let found = entries(&outcomes);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_dir);
        assert_eq!(found[0].full_path, "photos");
        assert_eq!(found[0].internal_id, "photos/");
    }

    #[test]
    fn test_attribute_markers() {
        let format = unix_like();
        let text = "Attributes      Size     Date    Time   Name\n\
                    -----------\n \
                    drwxr-xr-x         0  2024-01-15 10:30  src\n \
                    lrwxrwxrwx         7  2024-01-15 10:30  latest\n \
                    ...D...         0  15-01-24 10:30  win\n";
        let outcomes = parse_all(&format, text);
        let found = entries(&outcomes);
        assert_eq!(found.len(), 3);
        assert!(found[0].is_dir);
        assert!(found[1].is_link && !found[1].is_dir);
        assert!(found[2].is_dir);
        assert_eq!(
            found[2].timestamp.map(|t| t.date()),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn test_malformed_row_is_skipped_not_fatal() {
        let format = unix_like();
        let text = "Attributes      Size     Date    Time   Name\n\
                    -----------\n \
                    -rw-r--r--       12x  2024-01-15 10:30  bad.txt\n \
                    -rw-r--r--        12  2024-01-15 10:30  good.txt\n\
                    -----------\n\
                    \x20                 12                    1\n";
        let outcomes = parse_all(&format, text);
        assert!(matches!(outcomes[2], LineOutcome::Malformed(_)));
        let found = entries(&outcomes);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "good.txt");
        assert_eq!(outcomes.last(), Some(&LineOutcome::Ignored));
    }

    #[test]
    fn test_comment_from_preamble() {
        let format = ace_like();
        let mut parser = ColumnParser::new(&format);
        for line in ["UNACE v2.5", "", "Release notes", "for v1", ""] {
            parser.parse_line(line);
        }
        assert!(!parser.header_seen());
        assert_eq!(parser.comment().as_deref(), Some("Release notes\nfor v1"));
    }

    #[test]
    fn test_traversal_name_is_sanitized() {
        let format = ace_like();
        let text = "Date    Time Packed     Size     RatioFile\n\
                    15.01.05 10:30     40      100   40%  ../../etc/passwd\n";
        let outcomes = parse_all(&format, text);
        let found = entries(&outcomes);
        assert_eq!(found[0].full_path, "etc/passwd");
        assert_eq!(found[0].internal_id, "../../etc/passwd");
    }
}
