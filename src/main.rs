use anyhow::Context;
use clap::Parser;
use inquire::error::InquireError;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use geoname_search::{
    app::AppFactory,
    config::Config,
    semantic::{CityMatch, CitySearch},
};

#[derive(Serialize)]
struct QueryResult<'a> {
    query: &'a str,
    matches: Vec<CityMatch>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,ort=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve_and_print(search: &CitySearch, name: &str, top_k: usize) -> anyhow::Result<()> {
    let matches = search
        .resolve(name, top_k)
        .with_context(|| format!("Failed to resolve {name:?}"))?;

    print_json(&QueryResult {
        query: name,
        matches,
    })
}

fn interactive(search: &CitySearch, top_k: usize) -> anyhow::Result<()> {
    loop {
        let name = match inquire::Text::new("City name:")
            .with_help_message("empty input or Esc to quit")
            .prompt()
        {
            Ok(name) => name,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        if name.trim().is_empty() {
            break;
        }

        resolve_and_print(search, &name, top_k)?;
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let default_top_k = config.search.default_top_k;

    let app = AppFactory::connect(config)?;

    match args.command {
        cli::Command::InitSchema {} => {
            let tables = app.init_schema()?;
            print_json(&tables)
        }

        cli::Command::LoadPlaces { files } => {
            let loader = app.loader();
            let mut reports = Vec::with_capacity(files.len());
            for file in files {
                let report = loader
                    .load_places(&file)
                    .with_context(|| format!("Failed to load {}", file.display()))?;
                if report.table != app.place_table() {
                    log::warn!(
                        "{} is not the city view's place table ({}); set cities.place_table to search it",
                        report.table,
                        app.place_table()
                    );
                }
                reports.push(report);
            }
            print_json(&reports)
        }

        cli::Command::LoadAdminCodes { file } => {
            let report = app
                .loader()
                .load_admin_codes(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            print_json(&report)
        }

        cli::Command::LoadAlternateNames { file } => {
            let report = app
                .loader()
                .load_alternate_names(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            print_json(&report)
        }

        cli::Command::Search { names, top_k } => {
            let search = app.create_city_search()?;
            let top_k = top_k.unwrap_or(default_top_k);

            for name in &names {
                resolve_and_print(&search, name, top_k)?;
            }
            Ok(())
        }

        cli::Command::Interactive { top_k } => {
            let search = app.create_city_search()?;
            if let Some(stats) = search.stats() {
                log::info!(
                    "Index ready: {} cities, {} names, {} dimensions",
                    stats.rows,
                    stats.entries,
                    stats.dimensions
                );
            }

            interactive(&search, top_k.unwrap_or(default_top_k))
        }
    }
}
