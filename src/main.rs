mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use arkwrap::config::{ProgramOverrides, Settings};
use arkwrap::options::{CompressionOptions, ExtractionOptions, global_work_dir_for};
use arkwrap::utils::{format_size, format_timestamp};
use arkwrap::{ArchiveModel, Error, JobOutput, ModelEvent, Result};
use cli::{Args, Command};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    match rt.block_on(run(args)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("arkwrap: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let settings = Settings::load().await;
    let overrides = ProgramOverrides::load();

    let mut model = ArchiveModel::new(settings.clone());
    model.on_event(report);

    let open = model.open_path(&args.archive, &overrides)?;
    open.start()?;
    model.settle().await;
    if open.wait().await.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    let job = match args.command {
        Command::List => {
            print_listing(&model);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Info => {
            print_info(&model);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Extract {
            destination,
            entries,
        } => {
            let ids = resolve_ids(&model, &entries)?;
            let options = ExtractionOptions {
                preserve_paths: !args.flat,
                remove_root_node: args.strip_root,
                overwrite: args.overwrite || settings.overwrite,
            };
            model.extract_entries(ids, destination, options)?
        }
        Command::Add { files } => {
            let files = files
                .iter()
                .map(std::path::absolute)
                .collect::<std::io::Result<Vec<PathBuf>>>()?;
            let options = CompressionOptions {
                global_work_dir: global_work_dir_for(&files, ""),
            };
            model.add_files(files, options)?
        }
        Command::Delete { entries } => {
            let ids = resolve_ids(&model, &entries)?;
            model.delete_entries(ids)?
        }
    };

    job.start()?;
    model.settle().await;
    match job.wait().await {
        Ok(JobOutput::Extracted { destination }) => {
            eprintln!("extracted into {}", destination.display());
        }
        Ok(JobOutput::Modified(listing)) => {
            eprintln!("{} now holds {} entries", args.archive.display(), listing.entries.len());
        }
        Ok(JobOutput::Listing(_)) => {}
        Err(_) => return Ok(ExitCode::FAILURE),
    }
    Ok(ExitCode::SUCCESS)
}

/// Map user-supplied names to internal ids. A directory name selects
/// everything below it.
fn resolve_ids(model: &ArchiveModel, names: &[String]) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for name in names {
        if model.lookup(name).is_some() {
            ids.push(name.clone());
            continue;
        }
        let below = model.tree().ids_under(name);
        if below.is_empty() {
            return Err(Error::invalid_input(format!("no entry named {name:?}")));
        }
        ids.extend(below);
    }
    Ok(ids)
}

fn report(event: &ModelEvent) {
    match event {
        ModelEvent::Error { message, detail } => {
            eprintln!("error: {message}");
            if let Some(detail) = detail {
                eprintln!("  {detail}");
            }
        }
        ModelEvent::Output(line) => log::debug!("{line}"),
        ModelEvent::LoadingStarted | ModelEvent::LoadingFinished { .. } => {}
    }
}

fn print_listing(model: &ArchiveModel) {
    for entry in model.entries() {
        let suffix = if entry.is_dir { "/" } else { "" };
        println!(
            "{:>8}  {}  {}{}",
            format_size(entry.size),
            format_timestamp(entry.timestamp),
            entry.full_path,
            suffix
        );
    }
}

fn print_info(model: &ArchiveModel) {
    let archive = model.archive_path().unwrap_or(Path::new(""));
    let total: u64 = model.entries().iter().map(|e| e.size).sum();

    println!("Archive:    {}", archive.display());
    if let Some(backend) = model.backend() {
        println!("Format:     {}", backend.format().name());
    }
    println!("Read-only:  {}", if model.is_read_only() { "yes" } else { "no" });
    println!("Entries:    {}", model.entries().len());
    println!("Total size: {}", format_size(total));
    if let Some(folder) = model.subfolder_name() {
        let kind = if model.is_single_folder_archive() { "single folder" } else { "loose files" };
        println!("Extracts:   {folder} ({kind})");
    }
    if let Some(comment) = model.comment() {
        println!();
        println!("{comment}");
    }
}
