//! Static per-tool configuration

use std::ffi::OsString;
use std::path::PathBuf;

use regex::Regex;

use super::ArchiveFormat;
use crate::config::ProgramOverrides;
use crate::entry::Field;
use crate::parser::{ColumnRule, DateColumns, DateOrder, ListingFormat};

/// Program plus any arguments that must precede the operation's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Parse a whitespace separated command line such as `"wine unace.exe"`.
    pub fn parse(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace();
        let program = words.next()?;
        Some(words.fold(Self::new(program), |cmd, word| cmd.arg(word)))
    }

    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Whether the program resolves to an executable.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

/// Everything a backend needs to drive one archiver.
///
/// Built once per archive and shared read-only between the backend and its
/// sessions.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub format: ArchiveFormat,
    /// Used for add and delete
    pub archiver: ToolCommand,
    /// Used for list and extract
    pub unarchiver: ToolCommand,
    pub listing: ListingFormat,
    pub read_only: bool,
}

impl Descriptor {
    pub fn builtin(format: ArchiveFormat) -> Option<Self> {
        match format {
            ArchiveFormat::Ace => Some(ace()),
            ArchiveFormat::Zip => Some(zip()),
            ArchiveFormat::Rar => Some(rar()),
            ArchiveFormat::Unknown => None,
        }
    }

    pub fn with_archiver(mut self, tool: ToolCommand) -> Self {
        self.archiver = tool;
        self
    }

    pub fn with_unarchiver(mut self, tool: ToolCommand) -> Self {
        self.unarchiver = tool;
        self
    }

    /// Replace programs that have a configured override, matched by the
    /// default program name.
    pub fn with_overrides(mut self, overrides: &ProgramOverrides) -> Self {
        if let Some(tool) = overrides.get(&self.archiver.display_name()) {
            self.archiver = tool.clone();
        }
        if let Some(tool) = overrides.get(&self.unarchiver.display_name()) {
            self.unarchiver = tool.clone();
        }
        self
    }
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("built-in pattern {pattern:?}: {e}"))
}

const TIMESTAMP_PATTERN: &str = r"\d{2,4}-\d{2}-\d{2,4}\s+\d{2}:\d{2}(:\d{2})?";
const SEPARATOR_PATTERN: &str = r"^\s*-{5,}[\s-]*$";

fn ace() -> Descriptor {
    Descriptor {
        format: ArchiveFormat::Ace,
        archiver: ToolCommand::new("unace"),
        unarchiver: ToolCommand::new("unace"),
        listing: ListingFormat {
            header: "Date    Time Packed     Size     RatioFile".into(),
            separator: None,
            banners: vec![regex(r"^\s*UNACE"), regex(r"^\s*(processing|authenticity)")],
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
        },
        read_only: true,
    }
}

fn zip() -> Descriptor {
    Descriptor {
        format: ArchiveFormat::Zip,
        archiver: ToolCommand::new("zip"),
        unarchiver: ToolCommand::new("unzip"),
        listing: ListingFormat {
            header: "Length      Date    Time    Name".into(),
            separator: Some(regex(SEPARATOR_PATTERN)),
            banners: vec![regex(r"^Archive:")],
            rules: vec![
                ColumnRule::new(1, Field::Size, r"[0-9]+"),
                ColumnRule::new(2, Field::Timestamp, TIMESTAMP_PATTERN),
                ColumnRule::new(0, Field::FileName, r"\S"),
            ],
            date_order: DateOrder::MonthDayYear,
            date_columns: None,
        },
        read_only: false,
    }
}

fn rar() -> Descriptor {
    Descriptor {
        format: ArchiveFormat::Rar,
        archiver: ToolCommand::new("rar"),
        unarchiver: ToolCommand::new("unrar"),
        listing: ListingFormat {
            header: "Attributes      Size     Date    Time   Name".into(),
            separator: Some(regex(SEPARATOR_PATTERN)),
            banners: vec![
                regex(r"^\s*UNRAR "),
                regex(r"^\s*RAR "),
                regex(r"^Archive:"),
                regex(r"^Details:"),
            ],
            rules: vec![
                ColumnRule::new(3, Field::Attributes, r"\S+"),
                ColumnRule::new(1, Field::Size, r"[0-9]+"),
                ColumnRule::new(2, Field::Timestamp, TIMESTAMP_PATTERN),
                ColumnRule::new(0, Field::FileName, r"\S"),
            ],
            date_order: DateOrder::DayMonthYear,
            date_columns: None,
        },
        read_only: false,
    }
}
