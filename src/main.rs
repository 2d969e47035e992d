mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scraper::HhScraper;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "vacancy-harvester", about = "Job-listing harvester", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest every listing for a filter and replace the stored snapshot
    Scrape {
        /// Free-text filter (default: configured default filter)
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Print the stored snapshot
    List {
        /// Emit JSON instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Fetch one posting's detail page and print its description
    Details { url: String },

    /// Manage saved filter presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Show database statistics
    Stats,

    /// Apply schema migrations without scraping
    Migrate,
}

#[derive(Subcommand)]
enum PresetAction {
    /// Save a named filter
    Add { name: String, text: String },
    /// Delete a preset by id
    Rm { id: i64 },
    /// List saved presets
    Ls,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "vacancy_harvester=info,warn",
        1 => "vacancy_harvester=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Scrape { text } => {
            let _t = utils::Timer::start("Full scrape");
            let filter_text =
                text.unwrap_or_else(|| config.scraper.default_filter_text.clone());

            let stats = Pipeline::new(config).run(&filter_text).await?;
            info!(
                "Done: {} records persisted | {} pages ({} failed) | {} cards skipped",
                stats.records_persisted, stats.pages_total, stats.pages_failed,
                stats.cards_skipped,
            );
        }

        Command::List { json } => {
            let repo = Repository::open(&config.storage.db_path)?;
            let vacancies = repo.list_vacancies()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&vacancies)?);
            } else if vacancies.is_empty() {
                println!("No vacancies — run `vacancy-harvester scrape` first.");
            } else {
                println!("{} vacancies:", vacancies.len());
                for v in &vacancies {
                    println!("  {} — {} ({})", v.title, v.company, v.city);
                    println!("    {} | {} | {}", v.experience, v.remote_work, v.grade);
                    println!("    {}", v.link);
                }
            }
        }

        Command::Details { url } => {
            let harvester = HhScraper::new(&config.scraper)?;
            let description = harvester.fetch_details(&url).await?;
            println!("{description}");
        }

        Command::Preset { action } => {
            let repo = Repository::open(&config.storage.db_path)?;
            match action {
                PresetAction::Add { name, text } => {
                    let id = repo.create_preset(&name, &text)?;
                    println!("Preset {} saved as #{}.", name, id);
                }
                PresetAction::Rm { id } => {
                    if repo.delete_preset(id)? {
                        println!("Preset #{} removed.", id);
                    } else {
                        println!("No preset with id {}.", id);
                    }
                }
                PresetAction::Ls => {
                    let presets = repo.list_presets()?;
                    if presets.is_empty() {
                        println!("No presets saved.");
                    } else {
                        for p in &presets {
                            println!("  #{}  {}  →  {:?}", p.id, p.name, p.text);
                        }
                    }
                }
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let vacancies = repo.vacancy_count()?;
            let presets = repo.list_presets()?.len();
            println!("─────────────────────────────────");
            println!("  Vacancy Harvester — DB Stats");
            println!("─────────────────────────────────");
            println!("  Vacancies : {}", utils::fmt_number(vacancies));
            println!("  Presets   : {}", utils::fmt_number(presets as i64));
            match repo.last_run() {
                Some(run) => println!(
                    "  Last run  : {} ({}, {} records)",
                    run.started_at, run.status, run.records_persisted
                ),
                None => println!("  Last run  : —"),
            }
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
