//! filevault: operator CLI for the file storage core.
//!
//! Configuration comes from the environment; a `.env` file in the working directory is
//! loaded first if present. Every command needs `DATABASE_URL`, and all but `migrate` also
//! need a configured storage backend.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;
use clap::{Parser, Subcommand};
use filevault_cli::{
    init_tracing, truncate_string, upload_request_from_path, write_stream_to_path, Services,
};
use filevault_core::models::FileObject;
use filevault_core::{AppError, Config, ErrorMetadata};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "filevault", about = "File storage operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Upload a local file on behalf of an owner
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        #[arg(long)]
        owner: Uuid,
        /// Declared content type (defaults to one derived from the extension)
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List an owner's files, newest first
    List {
        #[arg(long)]
        owner: Uuid,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
        /// Output format: json or table
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Download a file to a local path
    Download {
        id: Uuid,
        #[arg(long)]
        owner: Uuid,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Soft-delete a file
    Delete {
        id: Uuid,
        #[arg(long)]
        owner: Uuid,
    },
    /// Undo a soft delete
    Restore {
        id: Uuid,
        #[arg(long)]
        owner: Uuid,
    },
    /// Print a direct (presigned or public) URL
    Url {
        id: Uuid,
        #[arg(long)]
        owner: Uuid,
        /// URL of the thumbnail instead of the original
        #[arg(long)]
        thumbnail: bool,
    },
    /// Share link operations
    Share {
        #[command(subcommand)]
        sub: ShareCommands,
    },
    /// Hard-purge files soft-deleted more than N days ago
    Purge {
        #[arg(long, default_value = "30")]
        older_than_days: i64,
    },
}

#[derive(Subcommand)]
enum ShareCommands {
    /// Issue a link for a file
    Create {
        file_id: Uuid,
        #[arg(long)]
        owner: Uuid,
        /// One of the configured durations, e.g. 1h, 24h, 7d
        #[arg(long, default_value = "24h")]
        duration: String,
    },
    /// List the links of a file with their state
    List {
        file_id: Uuid,
        #[arg(long)]
        owner: Uuid,
    },
    /// Download through a link, as an anonymous client would
    Resolve {
        token: String,
        #[arg(long, short)]
        output: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn print_files_table(files: &[FileObject]) {
    println!(
        "{:<36}  {:<32}  {:<24}  {:>10}  {}",
        "ID", "NAME", "TYPE", "SIZE", "CREATED"
    );
    for file in files {
        println!(
            "{:<36}  {:<32}  {:<24}  {:>10}  {}",
            file.id,
            truncate_string(&file.original_name, 32),
            truncate_string(&file.media_type, 24),
            file.human_readable_size(),
            file.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

/// Prefix service errors with their machine code. Operators see the full message, including
/// the details that clients never get.
fn describe(err: anyhow::Error) -> anyhow::Error {
    match err.downcast::<AppError>() {
        Ok(app) => anyhow::anyhow!("{}: {}", app.error_code(), app),
        Err(other) => other,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    run(cli.command, &config).await.map_err(describe)
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    if let Commands::Migrate = command {
        let pool = filevault_db::connect(&config.database).await?;
        filevault_db::run_migrations(&pool).await?;
        println!("Migrations applied");
        return Ok(());
    }

    let services = Services::connect(config).await?;

    match command {
        Commands::Migrate => {}
        Commands::Upload {
            file,
            owner,
            content_type,
        } => {
            let request = upload_request_from_path(&file, owner, content_type).await?;
            let stored = services.files.upload(request).await?;
            print_json(&stored)?;
        }
        Commands::List {
            owner,
            page,
            page_size,
            format,
        } => {
            let listing = services.files.list(owner, page, page_size).await?;
            match format.as_str() {
                "json" => print_json(&listing)?,
                _ => {
                    print_files_table(&listing.results);
                    println!(
                        "\npage {} ({} per page), {} files{}",
                        listing.page,
                        listing.page_size,
                        listing.count,
                        if listing.has_next() { ", more available" } else { "" }
                    );
                }
            }
        }
        Commands::Download { id, owner, output } => {
            let download = services.files.download(owner, id).await?;
            let name = download.suggested_filename.clone();
            let written = write_stream_to_path(download.stream, &output).await?;
            print_json(&serde_json::json!({
                "file_id": id,
                "filename": name,
                "bytes": written,
                "output": output.display().to_string(),
            }))?;
        }
        Commands::Delete { id, owner } => {
            let deleted = services.files.delete(owner, id).await?;
            print_json(&deleted)?;
        }
        Commands::Restore { id, owner } => {
            let restored = services.files.restore(owner, id).await?;
            print_json(&restored)?;
        }
        Commands::Url {
            id,
            owner,
            thumbnail,
        } => {
            let url = if thumbnail {
                services
                    .files
                    .thumbnail_url(owner, id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("File {} has no thumbnail", id))?
            } else {
                services.files.direct_url(owner, id).await?
            };
            print_json(&serde_json::json!({
                "url": url.url(),
                "presigned": url.is_presigned(),
            }))?;
        }
        Commands::Share { sub } => match sub {
            ShareCommands::Create {
                file_id,
                owner,
                duration,
            } => {
                let link = services.shares.issue(owner, file_id, &duration).await?;
                print_json(&link)?;
            }
            ShareCommands::List { file_id, owner } => {
                let links = services.shares.list_for_file(owner, file_id).await?;
                let rows: Vec<_> = links
                    .into_iter()
                    .map(|(link, state)| serde_json::json!({ "link": link, "state": state }))
                    .collect();
                print_json(&rows)?;
            }
            ShareCommands::Resolve { token, output } => {
                let shared = services.shares.resolve(&token).await?;
                let written = write_stream_to_path(shared.download.stream, &output).await?;
                print_json(&serde_json::json!({
                    "file_id": shared.file.id,
                    "filename": shared.file.original_name,
                    "bytes": written,
                    "download_count": shared.link.download_count,
                }))?;
            }
        },
        Commands::Purge { older_than_days } => {
            if older_than_days < 0 {
                anyhow::bail!("--older-than-days must not be negative");
            }
            let report = services
                .purge
                .purge_deleted(Duration::days(older_than_days))
                .await?;
            print_json(&serde_json::json!({
                "purged": report.purged,
                "failed": report.failed,
            }))?;
        }
    }

    Ok(())
}
