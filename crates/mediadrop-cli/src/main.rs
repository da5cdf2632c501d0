// mediadrop CLI - upload pictures to a mediadrop server

mod progress;
mod transport;
mod upload;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use transport::{HttpTransport, ItemInfo};
use upload::{SelectedFile, UploadConfig, UploadSession};

/// mediadrop - drop pictures onto a mediadrop server
#[derive(Parser)]
#[command(name = "mediadrop")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the mediadrop server
    #[arg(long, global = true, env = "MEDIADROP_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files, one item per file
    Upload {
        /// Files to upload
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<String>,

        #[command(flatten)]
        meta: MetaArgs,
    },
    /// Pick files interactively, then upload them
    Open {
        #[command(flatten)]
        meta: MetaArgs,
    },
    /// List uploaded items
    List,
    /// Show one item
    Show {
        /// Item id
        id: Uuid,
    },
}

/// Metadata sent with every file of one invocation.
#[derive(Args)]
struct MetaArgs {
    /// Item name
    #[arg(short, long, default_value = upload::DEFAULT_NAME)]
    name: String,

    /// Item description
    #[arg(short, long, default_value = upload::DEFAULT_DESCRIPTION)]
    description: String,
}

impl From<MetaArgs> for UploadConfig {
    fn from(meta: MetaArgs) -> Self {
        Self {
            name: meta.name,
            description: meta.description,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Upload { paths, meta } => handle_upload(&cli.server, paths, meta.into()),
        Commands::Open { meta } => handle_open(&cli.server, meta.into()),
        Commands::List => handle_list(&cli.server),
        Commands::Show { id } => handle_show(&cli.server, id),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "mediadrop=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn handle_upload(server: &str, paths: Vec<String>, config: UploadConfig) -> anyhow::Result<()> {
    let files = paths
        .iter()
        .map(SelectedFile::open)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = UploadSession::new(config);
    session.on_drop(files);
    run_session(server, &session)
}

fn handle_open(server: &str, config: UploadConfig) -> anyhow::Result<()> {
    let mut session = UploadSession::new(config);
    println!("{}", session.render());
    println!("Enter file paths, one per line (empty line to finish):");

    let stdin = std::io::stdin();
    let count = session.on_open_click(stdin.lock())?;
    if count == 0 {
        println!("No files selected.");
        return Ok(());
    }
    run_session(server, &session)
}

fn run_session(server: &str, session: &UploadSession) -> anyhow::Result<()> {
    let transport = HttpTransport::new(server)?;
    println!("{}", session.render());

    let summary = session.submit_all(&transport);

    println!();
    println!("{}", session.render());
    if summary.failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} uploads failed",
            summary.failed,
            summary.failed + summary.succeeded
        ));
    }

    println!(
        "{} {} uploaded to {}",
        "✓".green().bold(),
        summary.succeeded,
        server
    );
    Ok(())
}

fn handle_list(server: &str) -> anyhow::Result<()> {
    let transport = HttpTransport::new(server)?;
    let items = transport.list_items()?;

    if items.is_empty() {
        println!("No items yet.");
        return Ok(());
    }
    for item in &items {
        let file = item
            .picture
            .as_ref()
            .map(|p| p.file_name.as_str())
            .unwrap_or("(no picture)");
        println!("{}  {:<20} {}", item.id, truncate(&item.name, 20), file.dimmed());
    }
    Ok(())
}

fn handle_show(server: &str, id: Uuid) -> anyhow::Result<()> {
    let transport = HttpTransport::new(server)?;
    let item = transport.get_item(id)?;
    print_item(server, &item);
    Ok(())
}

fn print_item(server: &str, item: &ItemInfo) {
    println!("  Id:          {}", item.id);
    println!("  Name:        {}", item.name);
    println!("  Description: {}", item.description);
    println!("  Created:     {}", item.created_at);
    match &item.picture {
        Some(picture) => {
            println!(
                "  Picture:     {} ({}, {} bytes)",
                picture.file_name, picture.content_type, picture.file_size
            );
            println!("  Fingerprint: {}", picture.fingerprint.value);
        }
        None => println!("  Picture:     {}", "(none)".dimmed()),
    }
    for (style, url) in &item.urls {
        println!("  {:<12} {}{}", format!("{}:", style), server.trim_end_matches('/'), url);
    }
}

/// Shortens `text` to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
