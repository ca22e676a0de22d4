//! Command-line argument parsing

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Info,
    Extract {
        destination: PathBuf,
        entries: Vec<String>,
    },
    Add {
        files: Vec<PathBuf>,
    },
    Delete {
        entries: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub command: Command,
    pub archive: PathBuf,
    pub overwrite: bool,
    /// Extract without the stored directory structure
    pub flat: bool,
    /// Drop the common root folder when extracting
    pub strip_root: bool,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse(&args) {
        Ok(Some(args)) => args,
        Ok(None) => print_help(0),
        Err(msg) => {
            eprintln!("arkwrap: {msg}");
            eprintln!();
            print_help(2)
        }
    }
}

/// `Ok(None)` when help was requested.
pub fn parse(args: &[String]) -> Result<Option<Args>, String> {
    let mut overwrite = false;
    let mut flat = false;
    let mut strip_root = false;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-o" | "--overwrite" => overwrite = true,
            "-f" | "--flat" => flat = true,
            "-s" | "--strip-root" => strip_root = true,
            "-h" | "--help" => return Ok(None),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown option {flag}"));
            }
            value => positional.push(value.to_string()),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or("missing command")?;
    let archive = positional.next().map(PathBuf::from).ok_or("missing archive")?;
    let rest: Vec<String> = positional.collect();

    let command = match name.as_str() {
        "list" | "l" => Command::List,
        "info" => Command::Info,
        "extract" | "x" => {
            let mut rest = rest.into_iter();
            let destination = rest.next().map(PathBuf::from).ok_or("missing destination")?;
            Command::Extract {
                destination,
                entries: rest.collect(),
            }
        }
        "add" | "a" if rest.is_empty() => return Err("nothing to add".into()),
        "add" | "a" => Command::Add {
            files: rest.into_iter().map(PathBuf::from).collect(),
        },
        "delete" | "d" if rest.is_empty() => return Err("nothing to delete".into()),
        "delete" | "d" => Command::Delete { entries: rest },
        other => return Err(format!("unknown command {other}")),
    };

    Ok(Some(Args {
        command,
        archive,
        overwrite,
        flat,
        strip_root,
    }))
}

fn print_help(code: i32) -> ! {
    eprintln!("Usage: arkwrap [OPTIONS] <COMMAND> <ARCHIVE> [ARGS...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list                     List archive entries");
    eprintln!("  info                     Show archive properties and comment");
    eprintln!("  extract <DEST> [ENTRY..] Extract entries (everything when none given)");
    eprintln!("  add <FILE..>             Add files to the archive");
    eprintln!("  delete <ENTRY..>         Remove entries from the archive");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --overwrite    Replace existing files when extracting");
    eprintln!("  -f, --flat         Extract without directories");
    eprintln!("  -s, --strip-root   Drop the common root folder when extracting");
    eprintln!("  -h, --help         Show this help message");
    eprintln!();
    eprintln!("Archivers are found on PATH; override them in the [programs] table");
    eprintln!("of ~/.config/arkwrap/config.toml. Set RUST_LOG=debug for details.");
    std::process::exit(code);
}
