//! driven CLI - Work with a Drive through the session facade.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use driven::prelude::*;
use driven::{extract_id, BackendKind, Config, Credential, DriveFile, Driven, FileContent, FileIter};

/// CLI tool for working with a Drive.
#[derive(Parser)]
#[command(name = "driven")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long, env = "DRIVEN_CONFIG")]
    config: Option<PathBuf>,

    /// Backend to use (google or stub).
    #[arg(long, env = "DRIVEN_BACKEND")]
    backend: Option<BackendKind>,

    /// Path to service account JSON credentials file.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Pre-issued OAuth access token.
    #[arg(long, env = "DRIVEN_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Shared Drive ID (can also be set via SHARED_DRIVE_ID env var).
    #[arg(long, env = "SHARED_DRIVE_ID")]
    drive_id: Option<String>,

    /// Log debug output.
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and remember the credential.
    Login,

    /// Forget the remembered credential.
    Logout,

    #[command(flatten)]
    Data(DataCommand),
}

/// Commands that run inside an authenticated session.
#[derive(Subcommand)]
enum DataCommand {
    /// Show the authenticated account.
    Whoami,

    /// Show a file by URL or ID.
    Get { file: String },

    /// Find a file by exact title.
    Title {
        title: String,

        /// Only look inside this folder (URL or ID).
        #[arg(long = "in")]
        parent: Option<String>,
    },

    /// Show the full metadata of a file.
    Details { file: String },

    /// List a folder (the root when omitted).
    Ls { folder: Option<String> },

    /// List files other accounts have shared with you.
    Shared,

    /// Create a folder.
    Mkdir {
        name: String,

        /// Parent folder URL or ID.
        #[arg(long = "in")]
        parent: Option<String>,
    },

    /// Upload files to a folder.
    Upload {
        /// File patterns to upload (supports glob patterns like *.tar, file_{1,2,3}.txt).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder URL or ID (the root when omitted).
        #[arg(long, short = 't')]
        to: Option<String>,
    },

    /// Replace the content of a file.
    Update {
        file: String,
        source: PathBuf,

        /// Mime type of the new content (guessed from the path when omitted).
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Delete a file by URL or ID.
    Rm { file: String },

    /// List every file matching a Drive query.
    Query { filter: String },

    /// Show the first file matching a Drive query.
    First { filter: String },

    /// Download a file to local filesystem.
    Download {
        /// File URL or ID to download.
        file: String,

        /// Local destination path (file or directory).
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Give a user read access to a file.
    Share { file: String, user: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let driven = Driven::from_config(&config).context("Failed to set up the drive facade")?;

    match &cli.command {
        Commands::Login => {
            let credential = explicit_credential(&cli)?
                .context("login needs --credentials or --access-token")?;
            driven
                .authenticate(credential)
                .into_result()
                .context("Login failed")?;
            let user = driven.user()?;
            println!(
                "Logged in as {}",
                user.email_address.as_deref().unwrap_or("<unknown>")
            );
        }

        Commands::Logout => {
            match resolve_credential(&cli, &config) {
                Ok(credential) => {
                    if let Some(e) = driven.authenticate_with(credential, false).error() {
                        warn!("Stored credential no longer valid: {}", e);
                    }
                }
                Err(e) => warn!("{}", e),
            }
            driven.deauthenticate().into_result()?;
            // Teardown only clears the store for a live session.
            if let Some(store) = config.credential_store() {
                store.clear()?;
            }
            println!("Logged out.");
        }

        Commands::Data(command) => {
            let credential = resolve_credential(&cli, &config)?;
            driven
                .authenticate_with(credential, false)
                .into_result()
                .context("Authentication failed")?;
            run(&driven, command)?;
        }
    }

    Ok(())
}

fn run(driven: &Driven, command: &DataCommand) -> Result<()> {
    match command {
        DataCommand::Whoami => {
            let user = driven.user()?;
            println!("Name:    {}", user.name.as_deref().unwrap_or("-"));
            println!("Display: {}", user.display_name.as_deref().unwrap_or("-"));
            println!("Email:   {}", user.email_address.as_deref().unwrap_or("-"));
        }

        DataCommand::Get { file } => {
            let file = lookup(driven, file)?;
            print_files(std::iter::once(Ok(file)))?;
        }

        DataCommand::Title { title, parent } => {
            let file = match parent {
                Some(parent) => {
                    let parent = lookup(driven, parent)?;
                    driven.title_in(&parent, title)
                }
                None => driven.title(title),
            }
            .with_context(|| format!("No file titled '{}'", title))?;
            print_files(std::iter::once(Ok(file)))?;
        }

        DataCommand::Details { file } => {
            let file = lookup(driven, file)?;
            let detailed = driven
                .details(&file)
                .with_context(|| format!("Failed to fetch details of {}", file.id()))?;
            println!("{}", serde_json::to_string_pretty(detailed.model())?);
        }

        DataCommand::Ls { folder } => {
            let files: FileIter = match folder {
                Some(folder) => {
                    let folder = lookup(driven, folder)?;
                    driven.list_in(&folder)
                }
                None => driven.list(),
            }
            .context("Failed to list files")?;
            print_files(files)?;
        }

        DataCommand::Shared => {
            let files = driven.shared().context("Failed to list shared files")?;
            print_files(files)?;
        }

        DataCommand::Mkdir { name, parent } => {
            let folder = match parent {
                Some(parent) => {
                    let parent = lookup(driven, parent)?;
                    driven.create_in(&parent, name)
                }
                None => driven.create(name),
            }
            .with_context(|| format!("Failed to create folder {}", name))?;
            println!("Created {} ({})", folder.title(), folder.id());
        }

        DataCommand::Upload { patterns, to } => {
            let folder = to.as_deref().map(|to| lookup(driven, to)).transpose()?;
            let files_to_upload = expand_patterns(patterns)?;

            if files_to_upload.is_empty() {
                bail!("No files to upload");
            }

            let destination = folder.as_ref().map(DriveFile::id).unwrap_or("root");
            println!(
                "Uploading {} file(s) to {}...",
                files_to_upload.len(),
                destination
            );

            for (idx, file_path) in files_to_upload.iter().enumerate() {
                let filename = file_path.file_name().unwrap_or_default().to_string_lossy();
                print!("[{}/{}] Uploading {}... ", idx + 1, files_to_upload.len(), filename);

                let content = FileContent::from_path(file_path);
                let result = match &folder {
                    Some(folder) => driven.create_in_with(folder, &filename, content),
                    None => driven.create_with(&filename, content),
                };
                match result {
                    Ok(file) => println!("OK ({})", file.id()),
                    Err(e) => {
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            println!("Done.");
        }

        DataCommand::Update {
            file,
            source,
            mime_type,
        } => {
            let file = lookup(driven, file)?;
            let content = match mime_type {
                Some(mime_type) => FileContent::new(mime_type.clone(), source.clone()),
                None => FileContent::from_path(source),
            };
            let updated = driven
                .update(&file, content)
                .with_context(|| format!("Failed to update {}", file.id()))?;
            print_files(std::iter::once(Ok(updated)))?;
        }

        DataCommand::Rm { file } => {
            let id = extract_id(file)?;
            if driven.delete(&id)? {
                println!("Deleted {}", id);
            } else {
                println!("Nothing to delete: {} does not exist", id);
            }
        }

        DataCommand::Query { filter } => {
            let files = driven
                .query(filter)
                .with_context(|| format!("Query failed: {}", filter))?;
            print_files(files)?;
        }

        DataCommand::First { filter } => match driven.first(filter)? {
            Some(file) => print_files(std::iter::once(Ok(file)))?,
            None => println!("No match."),
        },

        DataCommand::Download { file, to } => {
            let file = lookup(driven, file)?;

            // Ensure destination directory exists
            if to.is_dir() || to.to_string_lossy().ends_with('/') {
                std::fs::create_dir_all(to)
                    .with_context(|| format!("Failed to create directory: {:?}", to))?;
            } else if let Some(parent) = to.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create directory: {:?}", parent))?;
                }
            }

            print!("Downloading {}... ", file.id());
            let saved = driven
                .download(&file, to)
                .with_context(|| format!("Failed to download file: {}", file.id()))?;
            println!("OK");
            println!("Saved to: {:?}", saved);
        }

        DataCommand::Share { file, user } => {
            let file = lookup(driven, file)?;
            if driven.share(&file, user)? {
                println!("Shared {} with {}", file.title(), user);
            } else {
                bail!("{} no longer exists", file.id());
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(drive_id) = &cli.drive_id {
        config.drive_id = Some(drive_id.clone());
    }
    Ok(config)
}

/// Credential given on the command line, if any.
fn explicit_credential(cli: &Cli) -> Result<Option<Credential>> {
    if let Some(token) = &cli.access_token {
        return Ok(Some(Credential::access_token(token)));
    }
    if let Some(path) = &cli.credentials {
        let credential = Credential::from_file(path)
            .with_context(|| format!("Failed to load credentials from {:?}", path))?;
        return Ok(Some(credential));
    }
    Ok(None)
}

/// Command line credential, else the remembered one.
fn resolve_credential(cli: &Cli, config: &Config) -> Result<Credential> {
    if let Some(credential) = explicit_credential(cli)? {
        return Ok(credential);
    }
    if let Some(store) = config.credential_store() {
        if let Some(credential) = store
            .load()
            .with_context(|| format!("Failed to read {:?}", store.path()))?
        {
            return Ok(credential);
        }
    }
    if config.backend == BackendKind::Stub {
        return Ok(Credential::anonymous());
    }
    bail!("No credential: pass --credentials/--access-token or run `driven login`")
}

fn lookup(driven: &Driven, url_or_id: &str) -> Result<DriveFile> {
    let id = extract_id(url_or_id)?;
    driven
        .get(&id)
        .with_context(|| format!("Failed to fetch {}", id))
}

fn print_files(files: impl IntoIterator<Item = driven::Result<DriveFile>>) -> Result<()> {
    let mut files = files.into_iter().peekable();
    if files.peek().is_none() {
        println!("No files found.");
        return Ok(());
    }

    println!("{:<44} {:>10} {:<30} {}", "ID", "SIZE", "TYPE", "NAME");
    println!("{}", "-".repeat(100));
    for file in files {
        println!("{}", file?);
    }
    Ok(())
}

fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files_to_upload: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        for expanded_pattern in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded_pattern)
                .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                // If no glob matches, treat as literal path
                let path = PathBuf::from(&expanded_pattern);
                if path.is_file() {
                    files_to_upload.push(path);
                } else {
                    eprintln!("Warning: No files matched pattern: {}", expanded_pattern);
                }
            } else {
                files_to_upload.extend(matches);
            }
        }
    }

    files_to_upload.sort();
    files_to_upload.dedup();
    Ok(files_to_upload)
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{}{}{}", prefix, alt.trim(), suffix);
                    expand_braces(&expanded)
                })
                .collect();
        }
    }

    vec![pattern.to_string()]
}
