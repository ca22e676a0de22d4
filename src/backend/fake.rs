//! Scripted stand-ins for archiver programs.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::{ArchiveFormat, Backend, Descriptor, ToolCommand};

pub const ZIP_LISTING: &str = "Archive:  test.zip
release notes
  Length      Date    Time    Name
---------  ---------- -----   ----
        0  2024-01-15 10:30   docs/
       12  2024-01-15 10:31   docs/readme.txt
     2048  2024-01-15 10:31   photos/beach.jpg
---------                     -------
     2060                     3 files
";

/// Workspace holding fake tool scripts and a dummy archive file.
pub struct FakeTools {
    pub dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Script run through `/bin/sh`, so it needs no exec permission.
    pub fn script(&self, name: &str, body: &str) -> ToolCommand {
        let path = self.path(name);
        std::fs::write(&path, body).unwrap();
        ToolCommand::new("/bin/sh").arg(path)
    }

    /// Script that prints `listing` on stdout.
    pub fn lister(&self, name: &str, listing: &str) -> ToolCommand {
        self.script(name, &format!("cat <<'LISTING'\n{listing}LISTING\n"))
    }

    /// Script that records its arguments, one per line, into `args_file`.
    pub fn recorder(&self, name: &str, args_file: &Path, extra: &str) -> ToolCommand {
        let body = format!(
            "for a; do printf '%s\\n' \"$a\" >> '{}'; last=$a; done\n{extra}\n",
            args_file.display()
        );
        self.script(name, &body)
    }

    /// `unzip` stand-in: lists [`ZIP_LISTING`] for `-l`, otherwise records
    /// its arguments and runs `extra` with `$last` set to the final argument.
    pub fn unzip(&self, args_file: &Path, extra: &str) -> ToolCommand {
        let body = format!(
            "if [ \"$1\" = \"-l\" ]; then\ncat <<'LISTING'\n{ZIP_LISTING}LISTING\nexit 0\nfi\n\
             for a; do printf '%s\\n' \"$a\" >> '{}'; last=$a; done\n{extra}\n",
            args_file.display()
        );
        self.script("unzip.sh", &body)
    }

    pub fn archive(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, b"PK\x05\x06").unwrap();
        path
    }

    /// Zip backend whose unarchiver lists [`ZIP_LISTING`] and whose other
    /// tools are the given commands.
    pub fn zip_backend(&self, unarchiver: Option<ToolCommand>, archiver: Option<ToolCommand>) -> Backend {
        let unarchiver = unarchiver.unwrap_or_else(|| self.lister("list.sh", ZIP_LISTING));
        let mut descriptor = Descriptor::builtin(ArchiveFormat::Zip)
            .unwrap()
            .with_unarchiver(unarchiver);
        if let Some(tool) = archiver {
            descriptor = descriptor.with_archiver(tool);
        }
        Backend::new(descriptor, self.archive("test.zip"))
    }

    pub fn read_args(&self, args_file: &Path) -> Vec<String> {
        std::fs::read_to_string(args_file)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
