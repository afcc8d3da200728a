//! Command-line interface for chunkvault buckets.

use anyhow::{Context, Result};
use chunkvault_bucket::{Bucket, SweepStats};
use chunkvault_core::config::AppConfig;
use chunkvault_core::{FileRevision, RevisionSelector, UploadOptions};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chunkvault")]
#[command(about = "Store and retrieve files as chunked, revisioned objects")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CHUNKVAULT_CONFIG",
        default_value = "chunkvault.toml"
    )]
    config: PathBuf,

    /// Bucket name (overrides configuration)
    #[arg(short, long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file as a new revision
    Put {
        /// Filename to store under
        name: String,

        /// Source file, or `-` for stdin (default)
        file: Option<PathBuf>,

        /// Chunk size in bytes (overrides the bucket default)
        #[arg(long)]
        chunk_size: Option<u64>,

        /// JSON metadata document stored with the revision
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Download a file (to stdout by default)
    Get {
        name: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Revision number; -1 is the latest
        #[arg(long, allow_negative_numbers = true)]
        revision: Option<i64>,
    },
    /// Delete the latest revision of a file
    Rm {
        name: String,

        /// Delete every revision
        #[arg(long)]
        all: bool,
    },
    /// Rename a file
    Mv { old: String, new: String },
    /// List filenames, optionally filtered by a case-insensitive prefix
    Ls {
        prefix: Option<String>,

        /// Show size and upload time
        #[arg(short, long)]
        long: bool,
    },
    /// Show a revision's metadata
    Stat {
        name: String,

        /// Revision number; -1 is the latest
        #[arg(long, allow_negative_numbers = true)]
        revision: Option<i64>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every revision of a file
    Revisions {
        name: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete chunks no catalog entry references
    Sweep {
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `get` can stream file content on stdout.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load_config(&cli.config)?;
    if let Some(bucket) = cli.bucket {
        config.bucket.name = bucket;
    }

    let bucket = chunkvault_bucket::from_config(&config)
        .await
        .context("failed to open bucket")?;

    match cli.command {
        Commands::Put {
            name,
            file,
            chunk_size,
            metadata,
        } => put(&bucket, &name, file, chunk_size, metadata).await,
        Commands::Get {
            name,
            output,
            revision,
        } => get(&bucket, &name, output, revision).await,
        Commands::Rm { name, all } => {
            if all {
                let removed = bucket
                    .purge(&name)
                    .await
                    .with_context(|| format!("failed to delete {name}"))?;
                println!("Removed {removed} revision(s) of {name}");
            } else {
                bucket
                    .delete(&name)
                    .await
                    .with_context(|| format!("failed to delete {name}"))?;
                println!("Removed {name}");
            }
            Ok(())
        }
        Commands::Mv { old, new } => {
            let renamed = bucket
                .rename(&old, &new)
                .await
                .with_context(|| format!("failed to rename {old} to {new}"))?;
            println!("Renamed {old} -> {new} (revision {})", renamed.revision);
            Ok(())
        }
        Commands::Ls { prefix, long } => ls(&bucket, prefix.as_deref().unwrap_or(""), long).await,
        Commands::Stat {
            name,
            revision,
            json,
        } => {
            let revision = bucket
                .resolve(&name, selector(revision)?)
                .await
                .with_context(|| format!("failed to stat {name}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&revision)?);
            } else {
                print_revision(&revision)?;
            }
            Ok(())
        }
        Commands::Revisions { name, json } => {
            let revisions = bucket
                .revisions(&name)
                .await
                .with_context(|| format!("failed to list revisions of {name}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&revisions)?);
            } else if revisions.is_empty() {
                println!("No revisions of {name}.");
            } else {
                println!("{:<8} {:<36} {:>12}  UPLOADED", "REVISION", "ID", "SIZE");
                for revision in &revisions {
                    println!(
                        "{:<8} {:<36} {:>12}  {}",
                        revision.revision,
                        revision.id,
                        revision.length,
                        revision.uploaded_at.format(&Rfc3339)?
                    );
                }
            }
            Ok(())
        }
        Commands::Sweep { dry_run, json } => {
            let stats = bucket
                .sweep_orphans(dry_run)
                .await
                .context("orphan sweep failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_sweep(&stats, dry_run);
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed("CHUNKVAULT_").split("__"))
        .extract()
        .context("failed to load configuration")
}

fn selector(revision: Option<i64>) -> Result<RevisionSelector> {
    match revision {
        None => Ok(RevisionSelector::Latest),
        Some(n) => Ok(RevisionSelector::from_signed(n)?),
    }
}

async fn put(
    bucket: &Bucket,
    name: &str,
    file: Option<PathBuf>,
    chunk_size: Option<u64>,
    metadata: Option<String>,
) -> Result<()> {
    let mut options = UploadOptions::default();
    if let Some(chunk_size) = chunk_size {
        options = options.with_chunk_size(chunk_size);
    }
    if let Some(metadata) = metadata {
        let value: serde_json::Value =
            serde_json::from_str(&metadata).context("--metadata must be valid JSON")?;
        options = options.with_metadata(value);
    }

    let revision = match file {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            bucket.upload_from_reader(name, file, options).await
        }
        _ => {
            bucket
                .upload_from_reader(name, tokio::io::stdin(), options)
                .await
        }
    }
    .with_context(|| format!("failed to upload {name}"))?;

    println!(
        "Stored {} revision {} ({} bytes, {})",
        revision.filename, revision.revision, revision.length, revision.checksum
    );
    Ok(())
}

async fn get(
    bucket: &Bucket,
    name: &str,
    output: Option<PathBuf>,
    revision: Option<i64>,
) -> Result<()> {
    let stream = bucket
        .open_download_by_name(name, selector(revision)?)
        .await
        .with_context(|| format!("failed to read {name}"))?;
    let mut reader = stream.into_async_read();

    match output {
        Some(path) => {
            // Stage next to the destination so a failed download never
            // leaves a truncated file at `path`.
            let file_name = path
                .file_name()
                .with_context(|| format!("{} is not a file path", path.display()))?;
            let partial = path.with_file_name(format!(
                ".{}.partial",
                file_name.to_string_lossy()
            ));

            let copied = async {
                let mut file = tokio::fs::File::create(&partial)
                    .await
                    .with_context(|| format!("failed to create {}", partial.display()))?;
                tokio::io::copy(&mut reader, &mut file)
                    .await
                    .with_context(|| format!("failed to read {name}"))?;
                file.sync_all().await?;
                tokio::fs::rename(&partial, &path)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))
            }
            .await;
            if copied.is_err() {
                let _ = tokio::fs::remove_file(&partial).await;
            }
            copied?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout)
                .await
                .with_context(|| format!("failed to read {name}"))?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

async fn ls(bucket: &Bucket, prefix: &str, long: bool) -> Result<()> {
    let listing = bucket.list_keys(prefix).await.context("failed to list files")?;
    for key in &listing.keys {
        if long {
            let revision = bucket.resolve(key, RevisionSelector::Latest).await?;
            println!(
                "{:>12}  {}  {}",
                revision.length,
                revision.uploaded_at.format(&Rfc3339)?,
                key
            );
        } else {
            println!("{key}");
        }
    }
    Ok(())
}

fn print_revision(revision: &FileRevision) -> Result<()> {
    println!("Name: {}", revision.filename);
    println!("ID: {}", revision.id);
    println!("Revision: {}", revision.revision);
    println!("Size: {}", revision.length);
    println!("Chunk size: {}", revision.chunk_size);
    println!("Chunks: {}", revision.chunk_count());
    println!(
        "Checksum: {}:{}",
        revision.checksum.algorithm(),
        revision.checksum
    );
    println!("Uploaded: {}", revision.uploaded_at.format(&Rfc3339)?);
    if let Some(metadata) = &revision.metadata {
        println!("Metadata: {metadata}");
    }
    Ok(())
}

fn print_sweep(stats: &SweepStats, dry_run: bool) {
    if dry_run {
        println!("Dry run: nothing deleted.");
    }
    println!("Files scanned: {}", stats.files_scanned);
    println!("Orphans found: {}", stats.orphans_found);
    println!("Chunks deleted: {}", stats.chunks_deleted);
    println!("Damaged revisions: {}", stats.damaged);
    println!("In-flight uploads skipped: {}", stats.in_flight_skipped);
    for id in &stats.orphan_ids {
        println!("  orphan {id}");
    }
    for id in &stats.damaged_ids {
        println!("  damaged {id}");
    }
}
