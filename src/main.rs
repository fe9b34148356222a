mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use humansize::{BINARY, format_size};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ProgressReporter};
use quire::report::{analyze_paths, build_report, write_report};
use quire::scanner::scan_fragments;
use quire::{
    ByteSource, CarveConfig, FormatFamily, LocalDocumentWriter, Reader, RecoveryEngine,
    Termination,
};

const TEXT_PREVIEW_CHARS: usize = 60;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.debug);

    match cli.command {
        Commands::Recover {
            input,
            output,
            config,
            max_files,
            window_size,
            overlap,
            max_block,
            no_run_dir,
            json,
        } => {
            let mut config = match config {
                Some(path) => CarveConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {:?}", path))?,
                None => CarveConfig::default(),
            };
            if let Some(dir) = output {
                config.output_directory = dir;
            }
            if let Some(n) = max_files {
                config.max_recovered_files = n;
            }
            if let Some(n) = window_size {
                config.window_size = n;
            }
            if let Some(n) = overlap {
                config.overlap_size = n;
            }
            if let Some(n) = max_block {
                config.max_block_size = n;
            }
            run_recover(&input, config, no_run_dir, json)
        }
        Commands::Scan {
            input,
            family,
            fragments,
            window_size,
            overlap,
            json,
        } => {
            let mut config = CarveConfig::default();
            if let Some(n) = window_size {
                config.window_size = n;
            }
            if let Some(n) = overlap {
                config.overlap_size = n;
            }
            run_scan(&input, family, &config, fragments.as_deref(), json)
        }
        Commands::Analyze { files, output } => run_analyze(&files, output.as_deref()),
    }
}

fn init_tracing(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_recover(input: &Path, config: CarveConfig, no_run_dir: bool, json: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let reader = Reader::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let source_size = reader.size();

    let mut writer = if no_run_dir {
        LocalDocumentWriter::new(&config.output_directory)
    } else {
        LocalDocumentWriter::per_run(&config.output_directory)
    }
    .context("Failed to prepare output directory")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    if !json {
        println!();
        println!("{}", style("Quire - Document Recovery").cyan().bold());
        println!("Source: {:?} ({})", input, format_size(source_size, BINARY));
        println!("Output: {:?}", writer.output_dir());
        println!();
    }

    let progress = ProgressReporter::for_source(source_size, "Carving documents...");
    let on_progress = |position: u64, _total: u64| progress.set_position(position);

    let mut engine = RecoveryEngine::new(reader, config)?;
    let run = engine
        .run_with_progress(&mut writer, &running, Some(&on_progress))
        .with_context(|| format!("Recovery over {:?} failed", input))?;

    let finished = match run.termination {
        Termination::NoMoreSignatures => "Scan complete",
        Termination::MaxFilesReached => "Stopped: document limit reached",
        Termination::Cancelled => "Cancelled",
    };
    progress.finish(finished);

    let report = build_report(&run.documents);
    let report_path = writer.output_dir().join("report.json");
    write_report(&report, &report_path)
        .with_context(|| format!("Failed to write {:?}", report_path))?;

    if json {
        let summary = json!({
            "output_directory": writer.output_dir(),
            "termination": run.termination,
            "stats": run.stats,
            "rejected": run.rejected,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    if run.documents.is_empty() {
        println!("[!] No recoverable documents found.");
    } else {
        println!(
            "Recovered {} documents ({}):",
            style(run.documents.len()).green().bold(),
            format_size(run.documents.iter().map(|d| d.byte_len()).sum::<u64>(), BINARY)
        );
        for doc in &run.documents {
            let mut line = format!(
                "  {}  {:<4} {:>10}  @0x{:012X}",
                doc.file_name,
                doc.family.to_string(),
                format_size(doc.byte_len(), BINARY),
                doc.byte_range.start
            );
            if doc.encrypted {
                line.push_str(&format!("  {}", style("encrypted").yellow()));
            } else if let Some(text) = &doc.extracted_text {
                line.push_str(&format!("  \"{}\"", preview(text)));
            } else if let Some(err) = &doc.extraction_error {
                line.push_str(&format!("  {}", style(err).red()));
            }
            println!("{}", line);
        }
    }
    println!();
    println!("Candidates rejected: {}", run.rejected);
    println!("Windows scanned:     {}", run.stats.slots_scanned);
    println!("Report:              {:?}", report_path);
    println!();

    Ok(())
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
    if text.chars().count() > TEXT_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

fn run_scan(
    input: &Path,
    family: FormatFamily,
    config: &CarveConfig,
    fragments: Option<&Path>,
    json: bool,
) -> Result<()> {
    let reader = Reader::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let source_size = reader.size();

    let stats = scan_fragments(reader, family.signature(), config, fragments)
        .with_context(|| format!("Scan of {:?} failed", input))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("{} scan of {:?} ({})", family, input, format_size(source_size, BINARY));
    println!("Windows scanned:  {}", stats.slots_scanned);
    println!(
        "Fragment hits:    {}",
        style(stats.valid_fragments_found).green().bold()
    );
    println!("Empty windows:    {}", stats.empty_slots());
    println!("Hit density:      {:.2}%", stats.density());
    if let Some(dir) = fragments {
        println!("Fragments:        {:?}", dir);
    }
    println!();

    Ok(())
}

fn run_analyze(files: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let report = analyze_paths(files);

    match output {
        Some(path) => {
            write_report(&report, path).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Report written to {:?} ({} files)", path, report.len());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
