// src/cli.rs
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, bail};

use crate::category::DomainCategory;
use crate::config::options::LoadOptions;
use crate::progress::LoadEvent;
use crate::router::LoadResult;
use crate::runner::Loader;

#[derive(Parser, Debug)]
#[command(name = "sets-data", version, about = "Fetch and cache STO reference data")]
pub struct Cli {
    /// Cache directory (default: $SETS_CACHE_DIR or .cache)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Wiki host, e.g. https://stowiki.net
    #[arg(long, global = true)]
    pub wiki_base: Option<String>,

    /// Write logs to <cache-dir>/debug.log instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Refresh categories from the wiki (stale ones only unless --force)
    Refresh {
        #[arg(long)]
        max_age_hours: Option<u64>,
        /// Ignore cache freshness
        #[arg(long)]
        force: bool,
        #[arg(long)]
        no_assets: bool,
        /// Comma-separated subset, e.g. ship,trait
        #[arg(long, value_delimiter = ',')]
        categories: Vec<DomainCategory>,
    },
    /// Print cached records as JSON lines
    Show {
        category: DomainCategory,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Cache age and size per category
    Status,
    /// Force the next refresh to bypass the freshness check
    Invalidate {
        #[arg(required_unless_present = "all")]
        category: Option<DomainCategory>,
        #[arg(long, conflicts_with = "category")]
        all: bool,
    },
}

pub fn run() -> Result<()> {
    run_with(Cli::parse())
}

pub fn run_with(cli: Cli) -> Result<()> {
    let mut opts = LoadOptions::from_env();
    if let Some(dir) = cli.cache_dir {
        opts = opts.with_cache_dir(dir);
    }
    if let Some(base) = cli.wiki_base.as_deref() {
        opts = opts.with_wiki_base(base);
    }
    let log_dir = cli.log_file.then(|| opts.cache_dir.clone());
    crate::log::init(log_dir.as_deref()).wrap_err("installing logger")?;

    match cli.command {
        Command::Refresh { max_age_hours, force, no_assets, categories } => {
            if !categories.is_empty() {
                opts = opts.with_categories(categories);
            }
            opts.fetch_assets = !no_assets;
            let max_age = max_age_hours.map(hours).unwrap_or(opts.max_age);
            refresh(opts, max_age, force)
        }
        Command::Show { category, limit } => {
            let loader = Loader::new(opts)?;
            let Some(entry) = loader.get_cached_records(category) else {
                bail!("nothing cached for {category}; run `refresh` first");
            };
            for r in entry.records.iter().take(limit) {
                println!("{}", serde_json::to_string(r)?);
            }
            if entry.records.len() > limit {
                eprintln!("… {} more", entry.records.len() - limit);
            }
            Ok(())
        }
        Command::Status => {
            let loader = Loader::new(opts)?;
            status(&loader);
            Ok(())
        }
        Command::Invalidate { category, all } => {
            let loader = Loader::new(opts)?;
            let targets: Vec<DomainCategory> = match (all, category) {
                (true, _) => DomainCategory::ALL.to_vec(),
                (false, Some(c)) => vec![c],
                (false, None) => bail!("name a category or pass --all"),
            };
            for c in targets {
                loader.invalidate(c)?;
                println!("{c}: invalidated");
            }
            Ok(())
        }
    }
}

fn refresh(opts: LoadOptions, max_age: Duration, force: bool) -> Result<()> {
    let loader = Loader::new(opts)?;
    if force {
        for &c in &loader.options().categories {
            loader.invalidate(c)?;
        }
    }

    let (handle, events) = loader.spawn_refresh(max_age);
    let mut results: Vec<LoadResult> = Vec::new();
    for ev in events {
        match ev {
            LoadEvent::Started { total } => eprintln!("Refreshing {total} categories…"),
            LoadEvent::Log(line) => eprintln!("  {line}"),
            LoadEvent::Finished(r) => results = r,
            LoadEvent::Progress { .. } | LoadEvent::CategoryDone(_) => {}
        }
    }
    if results.is_empty() {
        results = handle.join()?;
    }

    let failed: Vec<String> = results
        .iter()
        .filter(|r| r.is_failed())
        .map(|r| r.category.to_string())
        .collect();
    if !failed.is_empty() {
        bail!("no data available for: {}", failed.join(", "));
    }
    Ok(())
}

fn status(loader: &Loader) {
    let now = Utc::now();
    let max_age = loader.options().max_age;
    let store = loader.store();
    for c in DomainCategory::ALL {
        let Some(entry) = store.read(c) else {
            println!("{c:<15} not cached");
            continue;
        };
        let age_h = now.signed_duration_since(entry.written_at).num_hours();
        let state = if store.is_invalidated(c) {
            "invalidated"
        } else if store.is_stale_at(c, max_age, now) {
            "stale"
        } else {
            "fresh"
        };
        println!(
            "{c:<15} {:>6} records  {:<6} {age_h:>4}h old  {state}",
            entry.records.len(),
            entry.source,
        );
    }
}

/// Saturates instead of overflowing on absurd `--max-age-hours`.
fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_refresh_flags() {
        let cli = Cli::try_parse_from([
            "sets-data", "refresh", "--force", "--max-age-hours", "12", "--categories", "ship,doffs",
        ])
        .unwrap();
        match cli.command {
            Command::Refresh { max_age_hours, force, no_assets, categories } => {
                assert_eq!(max_age_hours, Some(12));
                assert!(force);
                assert!(!no_assets);
                assert_eq!(categories, vec![DomainCategory::Ship, DomainCategory::DutyOfficer]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn huge_max_age_saturates() {
        assert_eq!(hours(12), Duration::from_secs(12 * 3600));
        assert_eq!(hours(u64::MAX), Duration::from_secs(u64::MAX));
        let cli = Cli::try_parse_from(["sets-data", "refresh", "--max-age-hours", &u64::MAX.to_string()]).unwrap();
        assert!(matches!(cli.command, Command::Refresh { max_age_hours: Some(u64::MAX), .. }));
    }

    #[test]
    fn invalidate_needs_target() {
        assert!(Cli::try_parse_from(["sets-data", "invalidate"]).is_err());
        assert!(Cli::try_parse_from(["sets-data", "invalidate", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["sets-data", "invalidate", "trait", "--all"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
