//! Stowage CLI: store, fetch and delete objects in the configured backend.
//!
//! The backend comes from STORAGE_URL (`file://...` or `s3://bucket/prefix`);
//! see `stowage_core::Config` for the other variables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use stowage_cli::{format_size, init_tracing, upload_filename};
use stowage_core::Config;
use stowage_processing::{
    normalize_image, replace_upload, store_upload, UploadRequest, UploadValidator,
};
use stowage_storage::{create_storage, delete_all, OpenMode, Storage};

#[derive(Parser)]
#[command(name = "stowage", about = "Blob storage and media normalization CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file under a generated key
    Put {
        /// Path to the file to upload
        file: PathBuf,
        /// Normalize the image to WebP before storing
        #[arg(long)]
        featured: bool,
        /// Key of an existing object this upload replaces
        #[arg(long, value_name = "KEY")]
        replace: Option<String>,
    },
    /// Download an object
    Get {
        /// Storage key
        key: String,
        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete one or more objects
    Delete {
        /// Storage keys
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Check whether an object exists
    Exists {
        /// Storage key
        key: String,
    },
    /// Print the public URL of an object
    Url {
        /// Storage key
        key: String,
    },
    /// Convert a local image to WebP without touching storage
    Normalize {
        /// Input image
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Show the resolved storage configuration
    Config,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Put {
            file,
            featured,
            replace,
        } => {
            let (config, storage) = open_storage().await?;
            let filename = upload_filename(&file)
                .with_context(|| format!("Not a file path: {}", file.display()))?;
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let mut request = UploadRequest::new(filename, data);
            request.featured = featured;
            let validator = UploadValidator::from_config(&config.upload);

            match replace {
                Some(previous_key) => {
                    let replaced =
                        replace_upload(storage.as_ref(), &validator, &previous_key, request)
                            .await?;
                    if !replaced.previous_deleted {
                        tracing::warn!(key = %previous_key, "Previous object was not deleted");
                    }
                    print_json(&replaced)?;
                }
                None => {
                    let stored = store_upload(storage.as_ref(), &validator, request).await?;
                    tracing::info!(
                        key = %stored.storage_key,
                        size = %format_size(stored.size_bytes),
                        "Stored"
                    );
                    print_json(&stored)?;
                }
            }
        }
        Commands::Get { key, output } => {
            let (_, storage) = open_storage().await?;
            let mut reader = storage
                .open(&key, OpenMode::Read)
                .await?
                .into_reader()
                .context("Backend returned a writer for a read")?;

            let copied = match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    tokio::io::copy(&mut reader, &mut file).await?
                }
                None => tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?,
            };
            tracing::info!(key = %key, size = %format_size(copied), "Fetched");
        }
        Commands::Delete { keys } => {
            let (_, storage) = open_storage().await?;
            let report = delete_all(storage.as_ref(), &keys).await;
            print_json(&serde_json::json!({
                "deleted": &report.deleted,
                "failed": &report.failed,
            }))?;
            if !report.is_complete() {
                anyhow::bail!("{} of {} deletes failed", report.failed.len(), keys.len());
            }
        }
        Commands::Exists { key } => {
            let (_, storage) = open_storage().await?;
            let exists = storage.exists(&key).await?;
            print_json(&serde_json::json!({ "key": key, "exists": exists }))?;
        }
        Commands::Url { key } => {
            let (_, storage) = open_storage().await?;
            print_json(&serde_json::json!({ "key": key, "url": storage.url_for(&key) }))?;
        }
        Commands::Config => {
            let (config, storage) = open_storage().await?;
            let locator = config.storage.locator()?;
            print_json(&serde_json::json!({
                "backend": storage.backend_type(),
                "locator": locator.to_string(),
                "max_file_size": format_size(config.upload.max_file_size_bytes as u64),
                "allowed_extensions": config.upload.allowed_extensions,
            }))?;
        }
        Commands::Normalize { input, output } => normalize_file(input, output).await?,
    }

    Ok(())
}

async fn open_storage() -> anyhow::Result<(Config, Arc<dyn Storage>)> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage")?;
    Ok((config, storage))
}

/// Normalization is purely local and needs no storage configuration.
async fn normalize_file(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let normalized = {
        let input = input.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let mut file = std::fs::File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            Ok(normalize_image(&mut file)?)
        })
        .await??
    };

    let kind = normalized.kind;
    let bytes = normalized.into_bytes();
    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_json(&serde_json::json!({
        "input": input.display().to_string(),
        "output": output.display().to_string(),
        "animated": kind.is_animated(),
        "size": format_size(bytes.len() as u64),
    }))
}
