mod canonical;
mod error;
mod fetch;
mod janitor;
mod orchestrator;
mod render;
mod settings;
mod shorten;
mod store;
mod thumbnail;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use janitor::AssetJanitor;
use orchestrator::{AddResult, Orchestrator};
use render::Renderer;
use settings::Settings;
use shorten::{LlmShortener, Passthrough, Shortener};
use store::{CatalogStore, RemoveOutcome};

#[derive(Parser)]
#[command(
    name = "shelfgen",
    about = "Keep a catalog of item links with cached thumbnails and render it to a page",
    after_help = "Only one shelfgen process may modify a catalog at a time; \
                  concurrent add/remove/clean runs can lose updates."
)]
struct Cli {
    /// Configuration file (optional; SHELFGEN_* env vars override it)
    #[arg(long, global = true, default_value = settings::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch items, cache their thumbnails and add them to the catalog
    Add {
        /// Item page URLs (/dp/<id> or /gp/product/<id>)
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Remove items and their thumbnails from the catalog
    Remove {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Render the catalog to the output document
    Build,
    /// Delete thumbnails no catalog entry references
    Clean {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the catalog in display order
    List,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }
    code
}

/// Runs one command. `Ok(false)` means some item failed but the rest ran.
fn run(cli: Cli) -> Result<bool> {
    let settings = Settings::load(&cli.config)?;
    let store = CatalogStore::new(&settings.catalog_path);

    match cli.command {
        Commands::Add { urls } => add_items(&settings, &store, &urls),
        Commands::Remove { urls } => {
            let mut ok = true;
            for raw in &urls {
                let id = match canonical::canonicalize(raw) {
                    Ok(id) => id,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        ok = false;
                        continue;
                    }
                };
                match store.remove(&id)? {
                    RemoveOutcome::Removed(record) => {
                        println!("Removed {} ({})", record.display_name, record.id)
                    }
                    RemoveOutcome::NotFound => println!("Not in catalog: {}", id),
                }
            }
            Ok(ok)
        }
        Commands::Build => {
            let catalog = store.load();
            let document = Renderer::new(settings.thumbnail_size).render(&catalog);
            render::write_document(&settings.output_path, &document)?;
            println!(
                "Rendered {} items to {}",
                catalog.len(),
                settings.output_path.display()
            );
            Ok(true)
        }
        Commands::Clean { dry_run } => {
            let janitor = AssetJanitor::new(&store, &settings.asset_dir);
            let report = if dry_run {
                janitor.preview()?
            } else {
                janitor.sweep()?
            };
            let verb = if dry_run { "Would delete" } else { "Deleted" };
            for path in &report.orphans {
                println!("{} {}", verb, path.display());
            }
            for path in &report.dangling {
                println!("Missing asset {}", path.display());
            }
            for (path, err) in &report.failed {
                eprintln!("Failed to delete {}: {}", path.display(), err);
            }
            println!(
                "{} {} orphans, kept {} assets",
                verb,
                report.orphans.len(),
                report.kept
            );
            Ok(!report.has_errors())
        }
        Commands::List => {
            let catalog = store.load();
            if catalog.is_empty() {
                println!("Catalog is empty.");
                return Ok(true);
            }
            for (i, r) in catalog.records().iter().enumerate() {
                println!("{:>3} | {:<32} | {}", i + 1, truncate(&r.display_name, 32), r.id);
            }
            println!("\n{} items", catalog.len());
            Ok(true)
        }
    }
}

fn add_items(settings: &Settings, store: &CatalogStore, urls: &[String]) -> Result<bool> {
    let shortener: Box<dyn Shortener> =
        match LlmShortener::from_env(&settings.shorten_endpoint, &settings.shorten_model)? {
            Some(llm) => Box::new(llm),
            None => Box::new(Passthrough),
        };
    let orch = Orchestrator::new(
        settings,
        store,
        fetch::HttpFetcher::new()?,
        shortener,
        thumbnail::ThumbnailWriter::new()?,
    );

    let mut ok = true;
    for raw in urls {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Adding {}", raw));
        pb.enable_steady_tick(Duration::from_millis(100));
        let result = orch.add(raw);
        pb.finish_and_clear();

        match result {
            Ok(AddResult::Committed(record)) => {
                println!("Added {} -> {}", record.display_name, record.asset_path)
            }
            Ok(AddResult::Rejected(id)) => println!("Already in catalog: {}", id),
            Err(e) => {
                eprintln!("Error: {:#}", anyhow::Error::from(e));
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
