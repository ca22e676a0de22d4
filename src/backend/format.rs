//! Archive format detection

use std::path::Path;

/// Archivers with a built-in backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Ace,
    Zip,
    Rar,
    Unknown,
}

impl ArchiveFormat {
    /// Detect from the file name, falling back to magic bytes and then to the
    /// guessed MIME type.
    pub fn detect(path: &Path) -> Self {
        let by_name = Self::from_extension(path);
        if by_name != Self::Unknown {
            return by_name;
        }

        if let Ok(Some(kind)) = infer::get_from_path(path) {
            let by_magic = Self::from_mime(kind.mime_type());
            if by_magic != Self::Unknown {
                return by_magic;
            }
        }

        mime_guess::from_path(path)
            .iter()
            .map(|m| Self::from_mime(m.essence_str()))
            .find(|f| *f != Self::Unknown)
            .unwrap_or(Self::Unknown)
    }

    fn from_extension(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("ace") => Self::Ace,
            Some("zip") | Some("jar") => Self::Zip,
            Some("rar") => Self::Rar,
            _ => Self::Unknown,
        }
    }

    fn from_mime(mime: &str) -> Self {
        match mime {
            "application/zip" | "application/x-zip-compressed" | "application/java-archive" => {
                Self::Zip
            }
            "application/vnd.rar" | "application/x-rar-compressed" | "application/x-rar" => {
                Self::Rar
            }
            "application/x-ace-compressed" | "application/x-ace" => Self::Ace,
            _ => Self::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ace => "ace",
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(ArchiveFormat::detect(Path::new("a/b/Backup.ZIP")), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::detect(Path::new("old.ace")), ArchiveFormat::Ace);
        assert_eq!(ArchiveFormat::detect(Path::new("x.rar")), ArchiveFormat::Rar);
    }

    #[test]
    fn test_detect_by_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.bin");
        std::fs::write(&path, b"PK\x03\x04\x14\x00\x00\x00\x08\x00rest-of-header").unwrap();
        assert_eq!(ArchiveFormat::detect(&path), ArchiveFormat::Zip);

        let rar = dir.path().join("noext");
        std::fs::write(&rar, b"Rar!\x1a\x07\x01\x00payload").unwrap();
        assert_eq!(ArchiveFormat::detect(&rar), ArchiveFormat::Rar);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(ArchiveFormat::detect(Path::new("notes.txt")), ArchiveFormat::Unknown);
        assert_eq!(ArchiveFormat::detect(Path::new("missing-file")), ArchiveFormat::Unknown);
    }
}
