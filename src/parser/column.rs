//! Declarative column rules

use regex::Regex;

use crate::entry::Field;

/// How to find one field in a listing line.
///
/// Rules are applied in declaration order, each searching from where the
/// previous match ended. `column` is the slot the matched text is stored in;
/// descriptors refer to slots when they need several columns at once (date
/// reconstruction).
#[derive(Debug, Clone)]
pub struct ColumnRule {
    pub column: usize,
    pub field: Field,
    pub pattern: Regex,
    /// Matches longer than this are truncated
    pub width: Option<usize>,
    /// Missing optional columns do not reject the row
    pub optional: bool,
}

impl ColumnRule {
    /// Build a rule from a pattern known at compile time.
    ///
    /// Panics on an invalid pattern; built-in descriptors are covered by tests.
    pub fn new(column: usize, field: Field, pattern: &str) -> Self {
        Self {
            column,
            field,
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("column pattern {pattern:?}: {e}")),
            width: None,
            optional: false,
        }
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Locate this column in `line` at or after byte offset `from`.
    ///
    /// Returns the captured text and the offset the next rule starts from.
    /// The file name column always runs to the end of the line.
    pub fn extract<'a>(&self, line: &'a str, from: usize) -> Option<(&'a str, usize)> {
        let found = self.pattern.find_at(line, from)?;

        if self.field == Field::FileName {
            let rest = line[found.start()..].trim();
            return (!rest.is_empty()).then_some((rest, line.len()));
        }

        let text = found.as_str();
        let text = match self.width {
            Some(width) => match text.char_indices().nth(width) {
                Some((cut, _)) => &text[..cut],
                None => text,
            },
            None => text,
        };
        Some((text, found.start() + text.len()))
    }
}
