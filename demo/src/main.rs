mod api;
mod session;

use anyhow::Context;
use api::FakeApi;
use clap::{Args, Parser, Subcommand};
use session::{BrowseOptions, WatchOptions};
use shared::{PaginationStrategy, Sort, SortDirection, TableConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rowflow-demo")]
#[command(about = "Drive a rowflow table against an in-memory people directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the first page, then page, scroll or refresh through the directory
    Browse {
        #[command(flatten)]
        table: TableArgs,

        /// How many next-page / scroll / refresh steps to run
        #[arg(long, default_value = "3")]
        steps: usize,
    },
    /// Refresh on an interval while new people keep joining
    Watch {
        #[command(flatten)]
        table: TableArgs,

        /// Refresh interval in seconds
        #[arg(long, default_value = "1.0")]
        interval: f64,

        /// How long to watch, in seconds
        #[arg(long, default_value = "5")]
        duration: u64,

        /// Seconds between new people joining
        #[arg(long, default_value = "2")]
        grow_every: u64,
    },
}

#[derive(Args)]
struct TableArgs {
    /// TOML table config; flags below override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// none | paginate | scroll
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<PaginationStrategy>,

    #[arg(long)]
    limit: Option<usize>,

    /// Sort column, optionally suffixed with `:desc` (e.g. `name:desc`)
    #[arg(long, value_parser = parse_sort)]
    sort: Option<Sort>,

    #[arg(long, default_value = "42")]
    records: usize,

    /// Simulated response latency in milliseconds
    #[arg(long, default_value = "150")]
    latency: u64,

    /// Make every n-th request fail
    #[arg(long)]
    fail_every: Option<usize>,
}

impl TableArgs {
    fn table_config(&self) -> anyhow::Result<TableConfig> {
        let mut config = match &self.config {
            Some(path) => TableConfig::load(path)
                .with_context(|| format!("invalid table config {}", path.display()))?,
            None => TableConfig::default(),
        };
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if self.sort.is_some() {
            config.sort = self.sort.clone();
        }
        Ok(config)
    }

    fn api(&self) -> FakeApi {
        FakeApi::new(self.records)
            .with_latency(Duration::from_millis(self.latency))
            .with_fail_every(self.fail_every)
    }
}

fn parse_strategy(value: &str) -> Result<PaginationStrategy, String> {
    match value {
        "none" => Ok(PaginationStrategy::None),
        "paginate" => Ok(PaginationStrategy::Paginate),
        "scroll" => Ok(PaginationStrategy::Scroll),
        other => Err(format!("unknown strategy '{other}', expected none, paginate or scroll")),
    }
}

fn parse_sort(value: &str) -> Result<Sort, String> {
    let (column, direction) = match value.split_once(':') {
        Some((column, "asc")) => (column, SortDirection::Asc),
        Some((column, "desc")) => (column, SortDirection::Desc),
        Some((_, other)) => return Err(format!("unknown sort direction '{other}'")),
        None => (value, SortDirection::Asc),
    };
    if column.is_empty() {
        return Err("sort column must not be empty".to_string());
    }
    Ok(Sort::new(column, direction))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Browse { table, steps } => {
            let options = BrowseOptions {
                config: table.table_config()?,
                steps,
            };
            session::run_browse(table.api(), options).await
        }
        Commands::Watch {
            table,
            interval,
            duration,
            grow_every,
        } => {
            let mut config = table.table_config()?;
            config.refresh_interval_seconds = Some(interval);
            let options = WatchOptions {
                config,
                duration: Duration::from_secs(duration),
                grow_every: Duration::from_secs(grow_every),
            };
            session::run_watch(table.api(), options).await
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("name"), Ok(Sort::asc("name")));
        assert_eq!(parse_sort("email:desc"), Ok(Sort::desc("email")));
        assert!(parse_sort("name:sideways").is_err());
        assert!(parse_sort(":desc").is_err());
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(parse_strategy("scroll"), Ok(PaginationStrategy::Scroll));
        assert!(parse_strategy("infinite").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "rowflow-demo",
            "browse",
            "--strategy",
            "paginate",
            "--limit",
            "7",
            "--sort",
            "name:desc",
        ]);
        let Commands::Browse { table, steps } = cli.command else {
            panic!("expected browse");
        };

        let config = table.table_config().unwrap();
        assert_eq!(steps, 3);
        assert_eq!(config.strategy, PaginationStrategy::Paginate);
        assert_eq!(config.limit, Some(7));
        assert_eq!(config.sort, Some(Sort::desc("name")));
        assert_eq!(config.page, 1);
    }
}
