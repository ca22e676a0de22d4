//! Archive management on top of external archiver programs.
//!
//! Listing, extraction and modification are delegated to tools such as
//! `unace`, `unzip`/`zip` and `unrar`/`rar`. Their textual output is parsed
//! into [`ArchiveEntry`] records, operations run as asynchronous [`Job`]s,
//! and [`ArchiveModel`] keeps a tree of the archive for a presentation layer.

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod jobs;
pub mod model;
pub mod options;
pub mod parser;
pub mod safety;
pub mod tree;
pub mod utils;

pub use backend::{ArchiveFormat, Backend, Descriptor, Listing, Session, ToolCommand};
pub use entry::{ArchiveEntry, EntryTag, Field, FieldValue};
pub use error::{Error, ErrorKind, Result};
pub use jobs::{Job, JobEvent, JobId, JobKind, JobOutput, JobStatus};
pub use model::{ArchiveModel, ModelEvent, Preview};
pub use options::{CompressionOptions, ExtractionOptions};
