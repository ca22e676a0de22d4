//! Archive entry records

use chrono::NaiveDateTime;

/// Field tags a listing column can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FileName,
    Size,
    CompressedSize,
    CompressionRatio,
    /// Permission/attribute string, used for directory and link markers
    Attributes,
    /// Full date and time in a single column
    Timestamp,
    Year,
    Month,
    Day,
    Time,
}

/// Value of one entry field, as returned by [`ArchiveEntry::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Size(u64),
    Flag(bool),
    Timestamp(NaiveDateTime),
    Percent(f32),
}

/// Tags understood by [`ArchiveEntry::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryTag {
    FileName,
    InternalId,
    Size,
    CompressedSize,
    IsDirectory,
    Link,
    Timestamp,
    CompressionRatio,
}

/// One member of an archive, as reported by the archiver.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveEntry {
    /// Last path segment
    pub name: String,
    /// Sanitized relative path without trailing separator
    pub full_path: String,
    /// Name exactly as the tool printed it; passed back on the tool's command line
    pub internal_id: String,
    pub is_dir: bool,
    pub is_link: bool,
    pub size: u64,
    pub compressed_size: Option<u64>,
    pub timestamp: Option<NaiveDateTime>,
    pub ratio: Option<f32>,
}

impl ArchiveEntry {
    pub fn new(full_path: String, is_dir: bool, size: u64) -> Self {
        let internal_id = full_path.clone();
        Self::with_internal_id(full_path, internal_id, is_dir, size)
    }

    pub fn with_internal_id(
        full_path: String,
        internal_id: String,
        is_dir: bool,
        size: u64,
    ) -> Self {
        let name = full_path
            .split('/')
            .next_back()
            .unwrap_or(&full_path)
            .to_string();
        Self {
            name,
            full_path,
            internal_id,
            is_dir,
            is_link: false,
            size,
            compressed_size: None,
            timestamp: None,
            ratio: None,
        }
    }

    /// Look an entry field up by tag; `None` when the tool did not report it.
    pub fn get(&self, tag: EntryTag) -> Option<FieldValue<'_>> {
        match tag {
            EntryTag::FileName => Some(FieldValue::Text(&self.full_path)),
            EntryTag::InternalId => Some(FieldValue::Text(&self.internal_id)),
            EntryTag::Size => Some(FieldValue::Size(self.size)),
            EntryTag::CompressedSize => self.compressed_size.map(FieldValue::Size),
            EntryTag::IsDirectory => Some(FieldValue::Flag(self.is_dir)),
            EntryTag::Link => Some(FieldValue::Flag(self.is_link)),
            EntryTag::Timestamp => self.timestamp.map(FieldValue::Timestamp),
            EntryTag::CompressionRatio => self.ratio.map(FieldValue::Percent),
        }
    }

    /// Path segments of the sanitized name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.full_path.split('/').filter(|s| !s.is_empty())
    }
}
