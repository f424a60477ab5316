//! webdav-cli: browse and edit a WebDAV storage from the terminal
//!
//! Connection settings come from the environment:
//!   WEBDAV_URL, WEBDAV_USERNAME, WEBDAV_PASSWORD [, WOPI_DISCOVERY_URL]
//!
//! Usage:
//!   webdav-cli ls [path]                 List a directory
//!   webdav-cli mkdir <path>              Create a directory (and missing parents)
//!   webdav-cli put <local>... [-d dir]   Upload files
//!   webdav-cli get <remote> [local]      Download a file
//!   webdav-cli mv <from> <to>            Move or rename
//!   webdav-cli rm <path>                 Delete a file or directory

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use webdav_navigator::helpers::format_bytes;
use webdav_navigator::paths::{canonical_path, display_path};
use webdav_navigator::{
    AppConfig, DavEntry, Navigator, PreferenceStore, SortOrder, UploadFile, WebDavClient,
};

#[derive(Parser)]
#[command(
    name = "webdav-cli",
    about = "webdav-cli: browse and edit a WebDAV storage",
    version
)]
struct Cli {
    /// Log requests to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        /// Directory path (default: /)
        #[arg(default_value = "/")]
        path: String,
        /// Sort order (name, date, size); remembered for later listings
        #[arg(short, long)]
        sort: Option<SortOrder>,
    },
    /// Create a directory, including missing parents
    Mkdir { path: String },
    /// Upload local files into a remote directory
    Put {
        /// Local files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Remote directory
        #[arg(short, long, default_value = "/")]
        dir: String,
    },
    /// Download a file
    Get {
        remote: String,
        /// Local destination (default: remote file name)
        local: Option<PathBuf>,
    },
    /// Print a text file
    Cat { remote: String },
    /// Replace a remote text file with the content of a local file
    Save { remote: String, local: PathBuf },
    /// Create an empty file
    Touch { remote: String },
    /// Move or rename a file or directory
    Mv { from: String, to: String },
    /// Delete a file or directory
    Rm { path: String },
    /// Show document-collaboration properties of a file
    Wopi { remote: String },
    /// Set the default sort order
    Sort { order: SortOrder },
}

fn print_entries(entries: &[DavEntry]) {
    for entry in entries {
        let size = match (entry.is_dir, entry.size) {
            (true, _) => "-".to_string(),
            (false, Some(size)) => format_bytes(size),
            (false, None) => "?".to_string(),
        };
        let modified = entry
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let name = if entry.is_dir {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        println!("{:>8}  {:16}  {}", size, modified, name);
    }
}

fn upload_bar(total_files: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%")?.progress_chars("#>-"),
    );
    bar.set_message(format!("Uploading {} file(s)", total_files));
    Ok(bar)
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env().context("Missing WebDAV connection settings")?;
    let client = WebDavClient::connect(config.webdav.clone())?;

    match cli.command {
        Commands::Ls { path, sort } => {
            let mut nav = Navigator::new(client, PreferenceStore::default());
            nav.open(&path).await?;
            if let Some(order) = sort {
                nav.set_sort_order(order);
            }
            println!("{}", display_path(&nav.current_path()));
            print_entries(nav.entries());
        }
        Commands::Mkdir { path } => {
            client.create_directory(&canonical_path(&format!("{}/", path))).await?;
            println!("Created {}", path);
        }
        Commands::Put { files, dir } => {
            let uploads: Vec<UploadFile> = files.iter().map(UploadFile::from_path).collect();
            for (local, upload) in files.iter().zip(&uploads) {
                if !local.is_file() {
                    bail!("Not a file: {}", local.display());
                }
                if upload.name.is_empty() {
                    bail!("Cannot derive a file name from {}", local.display());
                }
            }

            let mut nav = Navigator::new(client, PreferenceStore::default());
            nav.open(&dir).await?;
            let bar = upload_bar(uploads.len())?;
            nav.upload_files(&uploads, |aggregate, _| bar.set_position(aggregate as u64))
                .await?;
            bar.finish_with_message("Upload complete");
        }
        Commands::Get { remote, local } => {
            let data = client.download_file(&canonical_path(&remote)).await?;
            let local = match local {
                Some(path) => path,
                None => {
                    let name = display_path(remote.trim_end_matches('/'))
                        .rsplit('/')
                        .next()
                        .unwrap_or("download")
                        .to_string();
                    PathBuf::from(if name.is_empty() { "download".to_string() } else { name })
                }
            };
            tokio::fs::write(&local, &data)
                .await
                .with_context(|| format!("Failed to write {}", local.display()))?;
            println!("Downloaded {} ({}) to {}", remote, format_bytes(data.len() as u64), local.display());
        }
        Commands::Cat { remote } => {
            print!("{}", client.get_file_content(&canonical_path(&remote)).await?);
        }
        Commands::Save { remote, local } => {
            let content = tokio::fs::read_to_string(&local)
                .await
                .with_context(|| format!("Failed to read {}", local.display()))?;
            client.save_file_content(&canonical_path(&remote), &content).await?;
            println!("Saved {}", remote);
        }
        Commands::Touch { remote } => {
            client.create_file(&canonical_path(&remote), &[]).await?;
            println!("Created {}", remote);
        }
        Commands::Mv { from, to } => {
            client.rename(&canonical_path(&from), &canonical_path(&to)).await?;
            println!("Moved {} -> {}", from, to);
        }
        Commands::Rm { path } => {
            client.delete(&canonical_path(&path)).await?;
            println!("Deleted {}", path);
        }
        Commands::Wopi { remote } => {
            let props = client.wopi_properties(&canonical_path(&remote)).await?;
            match props.wopi_url {
                Some(url) => {
                    println!("WOPI URL:  {}", url);
                    println!("Token TTL: {}", props.token_ttl.unwrap_or_default());
                }
                None => println!("No WOPI properties for {}", remote),
            }
            if let Some(discovery) = &config.wopi_discovery_url {
                println!("Discovery: {}", discovery);
            }
        }
        Commands::Sort { order } => {
            let mut nav = Navigator::new(client, PreferenceStore::default());
            nav.set_sort_order(order);
            println!("Default sort order: {}", order.as_str());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    webdav_navigator::init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
