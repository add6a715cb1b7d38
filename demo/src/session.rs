use crate::api::{ApiError, FakeApi, Person};
use anyhow::{Context, Result};
use futures::StreamExt;
use futures_signals::signal::{Signal, SignalExt};
use log::{info, warn};
use rowflow::dataflow::TaskHandle;
use rowflow::{PaginatedTable, PaginationStrategy, QueryParams, TableConfig};
use std::time::Duration;

pub type PeopleTable = PaginatedTable<Person, ApiError>;

const PREVIEW_ROWS: usize = 5;
const COMMAND_PICKUP: Duration = Duration::from_millis(10);

pub struct BrowseOptions {
    pub config: TableConfig,
    pub steps: usize,
}

pub struct WatchOptions {
    pub config: TableConfig,
    pub duration: Duration,
    pub grow_every: Duration,
}

pub fn people_table(api: FakeApi, config: TableConfig) -> PeopleTable {
    PaginatedTable::with_source(config, move |params: &QueryParams| api.list_people(params))
}

/// Loads the first page, then advances `steps` times the way the configured
/// strategy allows: next page, scroll, or plain refresh.
pub async fn run_browse(api: FakeApi, options: BrowseOptions) -> Result<()> {
    let strategy = options.config.strategy;
    println!(
        "Browsing {} people (strategy: {strategy:?}, limit: {:?}, sort: {:?})",
        api.record_count(),
        options.config.limit,
        options.config.sort,
    );

    let table = people_table(api.clone(), options.config);
    let _watchers = spawn_watchers(&table);

    wait_until_idle(&table).await;
    if let Some(error) = current(table.error_signal()).await {
        table.close();
        return Err(error).context("loading the first page failed");
    }

    for step in 1..=options.steps {
        match strategy {
            PaginationStrategy::Paginate => {
                println!("\n[{step}] next page");
                table.next_page();
            }
            PaginationStrategy::Scroll => {
                println!("\n[{step}] scroll");
                table.scroll();
            }
            PaginationStrategy::None => {
                println!("\n[{step}] refresh");
                table.refresh();
            }
        }
        wait_until_idle(&table).await;
    }

    let page = current(table.page_signal()).await;
    let rows = current(table.len_signal()).await;
    println!("\nDone: page {page}, {rows} rows shown, {} requests", api.requests());
    table.close();
    Ok(())
}

/// Keeps a table on an automatic refresh interval while new people are added.
pub async fn run_watch(api: FakeApi, options: WatchOptions) -> Result<()> {
    let interval = options
        .config
        .refresh_interval()
        .context("watch needs a refresh interval above zero")?;
    println!("Watching {} people, refreshing every {interval:?}", api.record_count());

    let table = people_table(api.clone(), options.config);
    let _watchers = spawn_watchers(&table);
    let _grower = TaskHandle::spawn({
        let api = api.clone();
        let grow_every = options.grow_every;
        async move {
            loop {
                tokio::time::sleep(grow_every).await;
                let person = api.insert_next();
                info!("[DEMO] {} joined", person.name);
            }
        }
    });

    tokio::time::sleep(options.duration).await;
    table.close();
    println!(
        "\nDone: {} people in the directory, {} requests",
        api.record_count(),
        api.requests()
    );
    Ok(())
}

fn spawn_watchers(table: &PeopleTable) -> Vec<TaskHandle> {
    vec![
        TaskHandle::spawn(table.rows_signal().for_each(|rows| {
            render_rows(&rows);
            async {}
        })),
        TaskHandle::spawn(table.error_signal().for_each(|error| {
            if let Some(error) = error {
                warn!("[DEMO] fetch failed: {error}");
            }
            async {}
        })),
    ]
}

fn render_rows(rows: &[Person]) {
    if rows.is_empty() {
        println!("  (no rows)");
        return;
    }
    for person in rows.iter().take(PREVIEW_ROWS) {
        println!("  #{:<4} {:<20} {}", person.id, person.name, person.email);
    }
    if rows.len() > PREVIEW_ROWS {
        println!("  ... {} more", rows.len() - PREVIEW_ROWS);
    }
}

/// Waits for the fetch started by the last command, if any, to settle.
///
/// The table picks commands up on its own task, so the fetch is given
/// `COMMAND_PICKUP` to show up as loading. A fetch that finishes before the
/// signal is polled never does, and then there is nothing left to wait for.
async fn wait_until_idle(table: &PeopleTable) {
    let mut loading = Box::pin(table.loading_signal().to_stream());
    let started = tokio::time::timeout(COMMAND_PICKUP, async {
        loop {
            match loading.next().await {
                Some(true) => return true,
                Some(false) => {}
                None => return false,
            }
        }
    })
    .await
    .unwrap_or(false);

    if started {
        while let Some(true) = loading.next().await {}
    }
}

async fn current<S>(signal: S) -> S::Item
where
    S: Signal,
    S::Item: Default,
{
    Box::pin(signal.to_stream()).next().await.unwrap_or_default()
}
