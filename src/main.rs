use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mergepart_config::MergePartConfig;
use mergepart_writer::{verify_part_directory, LocalDisk};
use std::path::PathBuf;

mod demo;
mod init;

/// Write, inspect and verify columnar data parts
#[derive(Parser)]
#[command(name = "mergepart")]
#[command(version)]
#[command(about = "Write, inspect and verify columnar data parts", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a sample part with a projection and print its summary
    Demo {
        /// Directory parts are written under
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Part name, also its directory name
        #[arg(long, default_value = "all_1_1_0")]
        part: String,

        /// Total rows to write
        #[arg(long, default_value_t = 100_000)]
        rows: usize,

        /// Rows per block handed to the writer
        #[arg(long, default_value_t = 8192)]
        block_rows: usize,

        /// Skip fsync when finishing the part
        #[arg(long)]
        no_sync: bool,
    },

    /// Recompute every checksum of a part directory
    Verify {
        /// Directory the part path is relative to
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Part directory relative to the root
        part: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => mergepart_config::load_from_file_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MergePartConfig::load().context("Failed to load configuration")?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init::init_tracing(&config.logging);

    match cli.command {
        Command::Demo {
            root,
            part,
            rows,
            block_rows,
            no_sync,
        } => {
            let args = demo::DemoArgs {
                root,
                part,
                rows,
                block_rows,
                sync: !no_sync,
            };
            let part = demo::run_demo(&config, &args)?;
            let summary = serde_json::json!({
                "part": part.name,
                "path": args.root.join(&part.relative_path).display().to_string(),
                "rows": part.rows_count,
                "bytes_on_disk": part.bytes_on_disk,
                "granules": part.index_granularity.marks_count(),
                "columns": part
                    .columns
                    .fields()
                    .iter()
                    .map(|field| field.name().clone())
                    .collect::<Vec<_>>(),
                "files": part.checksums.names().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Verify { root, part } => {
            let disk = LocalDisk::new(&root);
            let checksums = verify_part_directory(&disk, &part)
                .with_context(|| format!("Part '{}' failed verification", part.display()))?;
            println!(
                "{}: OK ({} files, {} bytes)",
                part.display(),
                checksums.len(),
                checksums.total_size_on_disk()
            );
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
