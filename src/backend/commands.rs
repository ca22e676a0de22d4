//! Command line construction per archiver

use std::ffi::OsString;
use std::path::Path;

use super::ArchiveFormat;
use crate::error::{Error, Result};
use crate::options::ExtractionOptions;

pub(crate) fn list_args(format: ArchiveFormat, archive: &Path) -> Vec<OsString> {
    let verb = match format {
        ArchiveFormat::Ace => "v",
        ArchiveFormat::Zip => "-l",
        ArchiveFormat::Rar | ArchiveFormat::Unknown => "l",
    };
    vec![verb.into(), archive.into()]
}

/// Turn internal ids into member arguments that select exactly that member.
///
/// `unzip` and `zip` read members as wildcard patterns, so metacharacters are
/// wrapped in single-character classes. `unrar`, `rar` and `unace` have no way
/// to quote `*` or `?`; such ids are refused.
pub(crate) fn escape_ids(format: ArchiveFormat, ids: &[String]) -> Result<Vec<OsString>> {
    ids.iter()
        .map(|id| match format {
            ArchiveFormat::Zip => Ok(OsString::from(escape_zip_pattern(id))),
            ArchiveFormat::Ace | ArchiveFormat::Rar | ArchiveFormat::Unknown => {
                if id.contains(['*', '?']) {
                    Err(Error::invalid_input(format!(
                        "{} cannot select {id:?} without wildcard expansion",
                        format.name()
                    )))
                } else {
                    Ok(OsString::from(id))
                }
            }
        })
        .collect()
}

fn escape_zip_pattern(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '[' | ']' | '*' | '?' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Arguments for extracting `ids` (everything when empty) into `dest`.
/// `ids` must already be escaped with [`escape_ids`].
pub(crate) fn extract_args(
    format: ArchiveFormat,
    archive: &Path,
    ids: &[OsString],
    dest: &Path,
    options: &ExtractionOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    match format {
        ArchiveFormat::Ace => {
            args.push(if options.preserve_paths { "x" } else { "e" }.into());
            args.push("-y".into());
            if options.overwrite {
                args.push("-o".into());
            }
            args.push(archive.into());
            args.push(with_trailing_separator(dest));
            args.extend(ids.iter().cloned());
        }
        ArchiveFormat::Zip => {
            args.push(if options.overwrite { "-o" } else { "-n" }.into());
            if !options.preserve_paths {
                args.push("-j".into());
            }
            args.push(archive.into());
            args.extend(ids.iter().cloned());
            args.push("-d".into());
            args.push(dest.into());
        }
        ArchiveFormat::Rar | ArchiveFormat::Unknown => {
            args.push(if options.preserve_paths { "x" } else { "e" }.into());
            args.push(if options.overwrite { "-o+" } else { "-o-" }.into());
            args.push(archive.into());
            args.extend(ids.iter().cloned());
            args.push(with_trailing_separator(dest));
        }
    }
    args
}

/// `None` when the format cannot be written.
pub(crate) fn add_args(
    format: ArchiveFormat,
    archive: &Path,
    paths: &[&Path],
) -> Option<Vec<OsString>> {
    let mut args: Vec<OsString> = match format {
        ArchiveFormat::Zip => vec!["-r".into(), archive.into()],
        ArchiveFormat::Rar => vec!["a".into(), archive.into()],
        ArchiveFormat::Ace | ArchiveFormat::Unknown => return None,
    };
    args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
    Some(args)
}

/// `ids` must already be escaped with [`escape_ids`].
pub(crate) fn delete_args(
    format: ArchiveFormat,
    archive: &Path,
    ids: &[OsString],
) -> Option<Vec<OsString>> {
    let mut args: Vec<OsString> = match format {
        ArchiveFormat::Zip => vec!["-d".into(), archive.into()],
        ArchiveFormat::Rar => vec!["d".into(), archive.into()],
        ArchiveFormat::Ace | ArchiveFormat::Unknown => return None,
    };
    args.extend(ids.iter().cloned());
    Some(args)
}

fn with_trailing_separator(dir: &Path) -> OsString {
    let mut s = dir.as_os_str().to_os_string();
    if !dir.as_os_str().to_string_lossy().ends_with('/') {
        s.push("/");
    }
    s
}
