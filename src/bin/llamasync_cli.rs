//! Command-line access to the sync cache: list pipelines, upload files, fetch cached copies.
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use llamasync::{
    cloud::FileUpload,
    config, logging,
    sync::{CacheOutcome, FileRef, FileSyncService, MissReason, UploadRequest},
};
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(
    name = "llamasync-cli",
    about = "Inspect LlamaCloud pipelines and manage the local file cache"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every project with its pipelines as JSON.
    Roster,
    /// Upload a file into a pipeline.
    Upload {
        #[arg(long)]
        project: String,
        #[arg(long)]
        pipeline: String,
        #[arg(long)]
        file: PathBuf,
        /// Return as soon as the file is registered.
        #[arg(long)]
        no_wait: bool,
        /// Custom metadata entry, repeatable.
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Download a pipeline file into the local cache.
    Download {
        #[arg(long)]
        pipeline: String,
        #[arg(long)]
        name: String,
        /// Re-download even when a cached copy exists.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    config::get_config().require_api_key()?;
    let service = FileSyncService::from_config().context("failed to build LlamaCloud client")?;

    match cli.command {
        Command::Roster => {
            let roster = service.resolve_pipeline_roster().await;
            println!("{}", serde_json::to_string_pretty(&roster)?);
        }
        Command::Upload {
            project,
            pipeline,
            file,
            no_wait,
            meta,
        } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("{} has no file name", file.display()))?;
            let request = UploadRequest {
                project_id: project,
                pipeline_id: pipeline,
                upload: FileUpload { name, bytes },
                custom_metadata: parse_meta(&meta)?,
                wait_for_processing: !no_wait,
            };
            let file_id = service
                .upload_and_wait(request)
                .await
                .context("upload failed")?;
            println!("{file_id}");
        }
        Command::Download {
            pipeline,
            name,
            force,
        } => {
            let file = FileRef::new(name, pipeline);
            match service.sync_file(&file, force).await {
                CacheOutcome::Hit { path } => println!("cached {}", path.display()),
                CacheOutcome::Resolved { path, bytes } => {
                    println!("downloaded {} ({bytes} bytes)", path.display())
                }
                CacheOutcome::Unresolved(MissReason::NotFound) => {
                    bail!("{} not found in pipeline {}", file.file_name, file.pipeline_id)
                }
                CacheOutcome::Unresolved(MissReason::InvalidName) => {
                    bail!("file name and pipeline id must not contain path separators")
                }
                CacheOutcome::Unresolved(MissReason::Failed(reason)) => {
                    bail!("download failed: {reason}")
                }
            }
        }
    }

    Ok(())
}

fn parse_meta(entries: &[String]) -> Result<Map<String, Value>> {
    let mut metadata = Map::new();
    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("metadata entry '{entry}' must look like KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("metadata entry '{entry}' has an empty key");
        }
        // Numbers and booleans keep their JSON type; everything else is a string.
        let value = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|parsed| parsed.is_number() || parsed.is_boolean())
            .unwrap_or_else(|| Value::String(value.to_string()));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}
