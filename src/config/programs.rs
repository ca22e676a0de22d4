//! Per-tool program overrides
//!
//! ```toml
//! [programs]
//! unzip = "/opt/bin/unzip"
//! unace = "wine /srv/tools/unace.exe"
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use toml::map::Map;

use crate::backend::ToolCommand;

#[derive(Clone, Debug, Default)]
pub struct ProgramOverrides {
    tools: HashMap<String, ToolCommand>,
}

impl ProgramOverrides {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("arkwrap").join("config.toml"))
    }

    /// Read overrides from the config file; a missing or unreadable file
    /// means no overrides.
    pub fn load() -> Self {
        let table = Self::config_path()
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|s| match s.parse::<toml::Table>() {
                Ok(table) => Some(table),
                Err(e) => {
                    log::warn!("ignoring malformed config: {e}");
                    None
                }
            })
            .unwrap_or_default();
        Self::from_table(&table)
    }

    pub fn from_table(table: &Map<String, toml::Value>) -> Self {
        let mut overrides = Self::default();
        let Some(toml::Value::Table(programs)) = table.get("programs") else {
            return overrides;
        };

        for (name, value) in programs {
            match value.as_str().and_then(ToolCommand::parse) {
                Some(tool) => overrides.insert(name, tool),
                None => log::warn!("programs.{name}: expected a command string"),
            }
        }
        overrides
    }

    pub fn get(&self, program: &str) -> Option<&ToolCommand> {
        self.tools.get(program)
    }

    pub fn insert(&mut self, program: impl Into<String>, tool: ToolCommand) {
        self.tools.insert(program.into(), tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table() {
        let table: toml::Table = r#"
            [extract]
            overwrite = true

            [programs]
            unzip = "/opt/bin/unzip"
            unace = "wine unace.exe"
            rar = 5
        "#
        .parse()
        .unwrap();

        let overrides = ProgramOverrides::from_table(&table);
        assert_eq!(overrides.get("unzip").unwrap().program, PathBuf::from("/opt/bin/unzip"));
        let unace = overrides.get("unace").unwrap();
        assert_eq!(unace.program, PathBuf::from("wine"));
        assert_eq!(unace.leading_args.len(), 1);
        assert!(overrides.get("rar").is_none());
    }

    #[test]
    fn test_no_programs_table() {
        let table: toml::Table = "title = \"x\"".parse().unwrap();
        assert!(ProgramOverrides::from_table(&table).is_empty());
    }
}
