//! Paginated Table Data Source
//!
//! [`PaginatedTable`] keeps page, limit, sort and strategy state on top of a
//! [`DataSource`] and folds the batches it produces into a row list:
//!
//! | strategy   | window requested             | batch handling       |
//! |------------|------------------------------|----------------------|
//! | `None`     | none, or `limit` rows if set | replaces the rows    |
//! | `Paginate` | one page                     | replaces the rows    |
//! | `Scroll`   | the next page                | appended to the rows |
//!
//! The source function is re-bound, and therefore re-fetched, only when the
//! derived [`QueryParams`] change by value.

mod state;

pub use state::TableState;

use crate::data_source::{DataChange, DataSource, DataSourceConfig, SourceStream};
use crate::dataflow::{Actor, Relay, relay};
use futures::channel::mpsc::UnboundedReceiver;
use futures::stream::{Stream, StreamExt};
use futures_signals::signal::{Mutable, Signal, SignalExt};
use futures_signals::signal_vec::{MutableVec, SignalVec, SignalVecExt};
use log::debug;
use shared::{PageWindow, PaginationStrategy, QueryParams, Sort, TableConfig};
use std::sync::Arc;
use std::time::Duration;

/// Source function of a table: one fetch per call, constrained by the params.
pub type QuerySource<T, E> = Arc<dyn Fn(&QueryParams) -> SourceStream<Vec<T>, E> + Send + Sync>;

enum TableCommand<T, E> {
    SourceReplaced(QuerySource<T, E>),
    LimitChanged(Option<usize>),
    SortChanged(Option<Sort>),
    StrategyChanged(PaginationStrategy),
    NextPageRequested,
    PreviousPageRequested,
    PageJumpRequested(usize),
    ScrollRequested,
    RefreshRequested,
    ResetRequested,
}

impl<T, E> Clone for TableCommand<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::SourceReplaced(query) => Self::SourceReplaced(query.clone()),
            Self::LimitChanged(limit) => Self::LimitChanged(*limit),
            Self::SortChanged(sort) => Self::SortChanged(sort.clone()),
            Self::StrategyChanged(strategy) => Self::StrategyChanged(*strategy),
            Self::NextPageRequested => Self::NextPageRequested,
            Self::PreviousPageRequested => Self::PreviousPageRequested,
            Self::PageJumpRequested(page) => Self::PageJumpRequested(*page),
            Self::ScrollRequested => Self::ScrollRequested,
            Self::RefreshRequested => Self::RefreshRequested,
            Self::ResetRequested => Self::ResetRequested,
        }
    }
}

/// Reactive data source for list and table views.
///
/// Mutators enqueue commands that the table's processor applies in call
/// order. Operations that do not fit the current strategy (`next_page()`
/// outside of `Paginate`, `scroll()` outside of `Scroll`) are ignored.
///
/// ```rust
/// use futures::stream;
/// use rowflow::{PaginatedTable, PaginationStrategy, QueryParams, TableConfig};
///
/// # async fn demo() {
/// let config = TableConfig {
///     limit: Some(25),
///     strategy: PaginationStrategy::Scroll,
///     ..TableConfig::default()
/// };
/// let table = PaginatedTable::with_source(config, |params: &QueryParams| {
///     let skip = params.skip.unwrap_or(0) as u32;
///     stream::iter([Ok::<_, String>((skip..skip + 25).collect::<Vec<_>>())])
/// });
///
/// let _rows = table.rows_signal();
/// table.scroll();
/// # }
/// ```
pub struct PaginatedTable<T, E> {
    state: Actor<TableState>,
    rows: MutableVec<T>,
    source: DataSource<Vec<T>, E>,
    command_relay: Relay<TableCommand<T, E>>,
}

impl<T, E> PaginatedTable<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: TableConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a table and fetch the configured initial page immediately.
    pub fn with_source<F, S>(config: TableConfig, query: F) -> Self
    where
        F: Fn(&QueryParams) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Vec<T>, E>> + Send + 'static,
    {
        Self::build(config, Some(box_query(query)))
    }

    fn build(config: TableConfig, query: Option<QuerySource<T, E>>) -> Self {
        let source = DataSource::new(DataSourceConfig {
            refresh_interval: config.refresh_interval(),
        });
        let rows = MutableVec::new();
        let (command_relay, mut command_stream) = relay();
        let batches = source.data_changes();

        let state = Actor::new(TableState::from_config(&config), {
            let source = source.clone();
            let rows = rows.clone();
            move |state| async move {
                let mut runner = TableRunner {
                    state,
                    rows,
                    source,
                    batches,
                    query,
                    bound_params: None,
                    pending_clears: 0,
                };
                runner.apply_query(false);

                loop {
                    let event = tokio::select! {
                        biased;
                        command = command_stream.next() => command.map(TableEvent::Command),
                        change = runner.batches.next() => change.map(TableEvent::Change),
                    };
                    match event {
                        Some(TableEvent::Command(command)) => runner.handle(command),
                        Some(TableEvent::Change(change)) => runner.apply_change(change),
                        None => break,
                    }
                }
            }
        });

        Self {
            state,
            rows,
            source,
            command_relay,
        }
    }

    /// Replace the source function. Under `Scroll` the rows are cleared and
    /// loading restarts at page 1.
    pub fn set_source<F, S>(&self, query: F)
    where
        F: Fn(&QueryParams) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Vec<T>, E>> + Send + 'static,
    {
        self.command_relay
            .send(TableCommand::SourceReplaced(box_query(query)));
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        self.command_relay.send(TableCommand::LimitChanged(limit));
    }

    pub fn set_sort(&self, sort: Option<Sort>) {
        self.command_relay.send(TableCommand::SortChanged(sort));
    }

    pub fn set_strategy(&self, strategy: PaginationStrategy) {
        self.command_relay.send(TableCommand::StrategyChanged(strategy));
    }

    pub fn next_page(&self) {
        self.command_relay.send(TableCommand::NextPageRequested);
    }

    /// No-op on the first page.
    pub fn previous_page(&self) {
        self.command_relay.send(TableCommand::PreviousPageRequested);
    }

    /// `0` is clamped to the first page.
    pub fn jump_to_page(&self, page: usize) {
        self.command_relay.send(TableCommand::PageJumpRequested(page));
    }

    /// Load the next page and append it to the rows.
    pub fn scroll(&self) {
        self.command_relay.send(TableCommand::ScrollRequested);
    }

    /// Re-fetch the current page. Outside of `Paginate` the table returns to
    /// page 1 first, and under `Scroll` the accumulated rows are dropped.
    pub fn refresh(&self) {
        self.command_relay.send(TableCommand::RefreshRequested);
    }

    /// Back to page 1 with the data source in its initial state, then fetch.
    pub fn reset(&self) {
        self.command_relay.send(TableCommand::ResetRequested);
    }

    pub fn set_refresh_interval(&self, refresh_interval: Option<Duration>) {
        self.source.set_refresh_interval(refresh_interval);
    }

    pub fn close(&self) {
        self.state.stop();
        self.command_relay.close();
        self.source.close();
    }

    // ===== ROWS =====

    pub fn rows_signal(&self) -> impl Signal<Item = Vec<T>> + use<T, E> {
        self.rows.signal_vec_cloned().to_signal_cloned()
    }

    /// Row diffs, for renderers that patch their output incrementally.
    pub fn rows_signal_vec(&self) -> impl SignalVec<Item = T> + use<T, E> {
        self.rows.signal_vec_cloned()
    }

    pub fn len_signal(&self) -> impl Signal<Item = usize> + use<T, E> {
        self.rows.signal_vec_cloned().len().dedupe()
    }

    pub fn empty_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.rows.signal_vec_cloned().len().map(|len| len == 0).dedupe()
    }

    // ===== PARAMETERS =====

    pub fn page_signal(&self) -> impl Signal<Item = usize> + use<T, E> {
        self.state.signal_ref(|state| state.page).dedupe()
    }

    pub fn pagination_signal(&self) -> impl Signal<Item = Option<PageWindow>> + use<T, E> {
        self.state.signal_ref(TableState::pagination).dedupe()
    }

    pub fn query_params_signal(&self) -> impl Signal<Item = QueryParams> + use<T, E> {
        self.state.signal_ref(TableState::query_params).dedupe_cloned()
    }

    pub fn limit_signal(&self) -> impl Signal<Item = Option<usize>> + use<T, E> {
        self.state.signal_ref(|state| state.limit).dedupe()
    }

    pub fn sort_signal(&self) -> impl Signal<Item = Option<Sort>> + use<T, E> {
        self.state.signal_ref(|state| state.sort.clone()).dedupe_cloned()
    }

    pub fn strategy_signal(&self) -> impl Signal<Item = PaginationStrategy> + use<T, E> {
        self.state.signal_ref(|state| state.strategy).dedupe()
    }

    pub fn is_paginated_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(TableState::is_paginated).dedupe()
    }

    pub fn is_scrolling_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(TableState::is_scrolling).dedupe()
    }

    pub fn state_signal(&self) -> impl Signal<Item = TableState> + use<T, E> {
        self.state.signal().dedupe_cloned()
    }

    pub fn refresh_interval_signal(&self) -> impl Signal<Item = Option<Duration>> + use<T, E> {
        self.source.refresh_interval_signal()
    }

    // ===== FETCH STATUS =====

    pub fn loading_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.source.loading_signal()
    }

    pub fn first_loading_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.source.first_loading_signal()
    }

    pub fn after_first_loading_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.source.after_first_loading_signal()
    }

    pub fn initial_state_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.source.initial_state_signal()
    }

    pub fn error_signal(&self) -> impl Signal<Item = Option<E>> + use<T, E> {
        self.source.error_signal()
    }

    pub fn has_error_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.source.has_error_signal()
    }
}

impl<T, E> Clone for PaginatedTable<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            rows: self.rows.clone(),
            source: self.source.clone(),
            command_relay: self.command_relay.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for PaginatedTable<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedTable")
            .field("state", &self.state)
            .field("rows", &self.rows.lock_ref().len())
            .field("source", &self.source)
            .finish()
    }
}

fn box_query<T, E, F, S>(query: F) -> QuerySource<T, E>
where
    F: Fn(&QueryParams) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Vec<T>, E>> + Send + 'static,
{
    Arc::new(move |params: &QueryParams| query(params).boxed())
}

enum TableEvent<T, E> {
    Command(TableCommand<T, E>),
    Change(DataChange<Vec<T>>),
}

/// Processor-side state of a [`PaginatedTable`].
struct TableRunner<T, E> {
    state: Mutable<TableState>,
    rows: MutableVec<T>,
    source: DataSource<Vec<T>, E>,
    batches: UnboundedReceiver<DataChange<Vec<T>>>,
    query: Option<QuerySource<T, E>>,
    /// Params the data source is currently bound to.
    bound_params: Option<QueryParams>,
    /// Clears sent to the data source and not yet seen on `batches`.
    pending_clears: usize,
}

impl<T, E> TableRunner<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    fn handle(&mut self, command: TableCommand<T, E>) {
        let (strategy, page) = {
            let state = self.state.lock_ref();
            (state.strategy, state.page)
        };
        let scrolling = strategy == PaginationStrategy::Scroll;

        match command {
            TableCommand::SourceReplaced(query) => {
                self.query = Some(query);
                self.bound_params = None;
                if scrolling {
                    self.restart_scroll();
                }
                self.apply_query(false);
            }
            TableCommand::LimitChanged(limit) => {
                if self.state.lock_ref().limit == limit {
                    return;
                }
                self.state.lock_mut().limit = limit;
                if scrolling {
                    self.restart_scroll();
                }
                self.apply_query(scrolling);
            }
            TableCommand::SortChanged(sort) => {
                if self.state.lock_ref().sort == sort {
                    return;
                }
                self.state.lock_mut().sort = sort;
                if scrolling {
                    self.restart_scroll();
                }
                self.apply_query(scrolling);
            }
            TableCommand::StrategyChanged(next) => self.change_strategy(strategy, next, page),
            TableCommand::NextPageRequested if strategy == PaginationStrategy::Paginate => {
                self.state.lock_mut().advance();
                self.apply_query(false);
            }
            TableCommand::PreviousPageRequested if strategy == PaginationStrategy::Paginate => {
                if self.state.lock_mut().step_back() {
                    self.apply_query(false);
                }
            }
            TableCommand::PageJumpRequested(target) if strategy == PaginationStrategy::Paginate => {
                self.state.lock_mut().jump_to(target);
                self.apply_query(false);
            }
            TableCommand::ScrollRequested if scrolling => {
                self.state.lock_mut().advance();
                self.apply_query(false);
            }
            TableCommand::NextPageRequested
            | TableCommand::PreviousPageRequested
            | TableCommand::PageJumpRequested(_)
            | TableCommand::ScrollRequested => {}
            TableCommand::RefreshRequested => {
                let back_to_first = strategy != PaginationStrategy::Paginate && page != 1;
                if scrolling {
                    self.clear_rows();
                }
                if scrolling || back_to_first {
                    self.clear_source_data();
                }
                if back_to_first {
                    self.state.lock_mut().jump_to(1);
                }
                self.apply_query(true);
            }
            TableCommand::ResetRequested => {
                if scrolling {
                    self.clear_rows();
                }
                self.pending_clears += 1;
                self.source.reset();
                self.state.lock_mut().jump_to(1);
                self.apply_query(true);
            }
        }
    }

    fn change_strategy(&mut self, previous: PaginationStrategy, next: PaginationStrategy, page: usize) {
        if previous == next {
            return;
        }
        debug!("[TABLE] strategy {previous:?} -> {next:?}");
        self.state.lock_mut().strategy = next;

        match (previous, next) {
            (_, PaginationStrategy::Scroll) => self.restart_scroll(),
            (PaginationStrategy::Scroll, _) | (_, PaginationStrategy::None) if page != 1 => {
                self.clear_source_data();
                self.state.lock_mut().jump_to(1);
            }
            _ => {}
        }
        self.apply_query(next == PaginationStrategy::Scroll);
    }

    /// Bind the data source to the current params, or re-run it when `force`
    /// is set and the params did not change.
    fn apply_query(&mut self, force: bool) {
        let Some(query) = &self.query else {
            return;
        };
        let params = self.state.lock_ref().query_params();

        if self.bound_params.as_ref() != Some(&params) {
            debug!("[TABLE] binding source to {:?}", params.to_pairs());
            self.bound_params = Some(params.clone());
            let query = query.clone();
            self.source
                .replace_source(Arc::new(move || query(&params)));
        } else if force {
            self.source.refresh();
        }
    }

    fn apply_change(&mut self, change: DataChange<Vec<T>>) {
        match change {
            DataChange::Cleared { .. } => {
                self.pending_clears = self.pending_clears.saturating_sub(1);
                if !self.state.lock_ref().is_scrolling() {
                    self.rows.lock_mut().clear();
                }
            }
            DataChange::Produced(_) if self.pending_clears > 0 => {
                debug!("[TABLE] dropping batch fetched before a clear");
            }
            DataChange::Produced(batch) => {
                if self.state.lock_ref().is_scrolling() {
                    let mut rows = self.rows.lock_mut();
                    for row in batch {
                        rows.push_cloned(row);
                    }
                } else {
                    self.rows.lock_mut().replace_cloned(batch);
                }
            }
        }
    }

    /// Empty the rows and start accumulating again from page 1.
    fn restart_scroll(&mut self) {
        self.clear_rows();
        self.clear_source_data();
        self.state.lock_mut().jump_to(1);
    }

    fn clear_rows(&mut self) {
        self.rows.lock_mut().clear();
    }

    fn clear_source_data(&mut self) {
        self.pending_clears += 1;
        self.source.clear_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use shared::SortDirection;
    use std::sync::Mutex;
    use tokio::time::sleep;

    type Table = PaginatedTable<u32, String>;
    type Calls = Arc<Mutex<Vec<QueryParams>>>;

    async fn current<S: Signal>(signal: S) -> S::Item {
        Box::pin(signal.to_stream()).next().await.unwrap()
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn select_rows(total: u32, params: &QueryParams) -> Vec<u32> {
        let mut rows: Vec<u32> = (1..=total).collect();
        if params.sort_direction == Some(SortDirection::Desc) {
            rows.reverse();
        }
        match params.window() {
            Some(window) => rows.into_iter().skip(window.skip).take(window.take).collect(),
            None => rows,
        }
    }

    /// `1..=total`, honoring the window and sort direction of each call.
    fn numbers(
        total: u32,
        calls: Calls,
    ) -> impl Fn(&QueryParams) -> stream::Iter<std::array::IntoIter<Result<Vec<u32>, String>, 1>>
    + Send
    + Sync
    + 'static {
        move |params: &QueryParams| {
            calls.lock().unwrap().push(params.clone());
            stream::iter([Ok(select_rows(total, params))])
        }
    }

    fn config(limit: Option<usize>, strategy: PaginationStrategy) -> TableConfig {
        TableConfig {
            limit,
            strategy,
            ..TableConfig::default()
        }
    }

    fn call_count(calls: &Calls) -> usize {
        calls.lock().unwrap().len()
    }

    fn last_call(calls: &Calls) -> QueryParams {
        calls.lock().unwrap().last().cloned().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_accumulates_pages() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Scroll), numbers(20, calls.clone()));
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);

        table.scroll();
        settle().await;
        table.scroll();
        settle().await;

        assert_eq!(current(table.rows_signal()).await, (1..=9).collect::<Vec<_>>());
        assert_eq!(current(table.page_signal()).await, 3);
        let skips: Vec<_> = calls.lock().unwrap().iter().map(|params| params.skip).collect();
        assert_eq!(skips, vec![Some(0), Some(3), Some(6)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paginate_replaces_rows() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);

        table.next_page();
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![4, 5, 6]);

        table.previous_page();
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
        assert_eq!(call_count(&calls), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_never_drops_below_one() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));

        for _ in 0..10 {
            table.previous_page();
        }
        settle().await;

        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(call_count(&calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_operations_are_ignored() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::None), numbers(20, calls.clone()));

        table.next_page();
        table.jump_to_page(4);
        table.scroll();
        settle().await;
        assert_eq!(current(table.page_signal()).await, 1);

        table.set_strategy(PaginationStrategy::Paginate);
        table.scroll();
        settle().await;
        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(call_count(&calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jump_to_page_clamps_to_first_page() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(5), PaginationStrategy::Paginate), numbers(50, calls.clone()));

        table.jump_to_page(4);
        settle().await;
        assert_eq!(last_call(&calls).skip, Some(15));
        assert_eq!(current(table.rows_signal()).await, vec![16, 17, 18, 19, 20]);

        table.jump_to_page(0);
        settle().await;
        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(last_call(&calls).skip, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_follows_row_count() {
        let table = Table::new(config(Some(3), PaginationStrategy::Paginate));
        settle().await;
        assert!(current(table.empty_signal()).await);
        assert_eq!(current(table.len_signal()).await, 0);

        table.set_source(numbers(20, Calls::default()));
        settle().await;
        assert!(!current(table.empty_signal()).await);
        assert_eq!(current(table.len_signal()).await, 3);

        table.set_source(numbers(0, Calls::default()));
        settle().await;
        assert!(current(table.empty_signal()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_params_follow_parameters() {
        let table = Table::new(TableConfig {
            page: 2,
            limit: Some(5),
            strategy: PaginationStrategy::Paginate,
            sort: Some(Sort::asc("id")),
            ..TableConfig::default()
        });

        let params = current(table.query_params_signal()).await;
        assert_eq!(
            params.to_pairs(),
            vec![
                ("skip", "5".to_string()),
                ("take", "5".to_string()),
                ("sortBy", "id".to_string()),
                ("sortDirection", "asc".to_string()),
            ]
        );
        assert_eq!(
            current(table.pagination_signal()).await,
            Some(PageWindow { skip: 5, take: 5 })
        );
        assert!(current(table.is_paginated_signal()).await);
        assert!(!current(table.is_scrolling_signal()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_change_under_scroll_restarts_from_first_page() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Scroll), numbers(20, calls.clone()));
        settle().await;
        for _ in 0..2 {
            table.scroll();
            settle().await;
        }
        assert_eq!(current(table.len_signal()).await, 9);

        table.set_sort(Some(Sort::desc("id")));
        settle().await;

        assert_eq!(current(table.rows_signal()).await, vec![20, 19, 18]);
        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(current(table.sort_signal()).await, Some(Sort::desc("id")));
        assert_eq!(last_call(&calls).skip, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_sort_and_limit_are_ignored() {
        let calls = Calls::default();
        let table = Table::with_source(
            TableConfig {
                sort: Some(Sort::asc("id")),
                ..config(Some(3), PaginationStrategy::Scroll)
            },
            numbers(20, calls.clone()),
        );
        settle().await;
        table.scroll();
        settle().await;

        table.set_sort(Some(Sort::asc("id")));
        table.set_limit(Some(3));
        settle().await;

        assert_eq!(call_count(&calls), 2);
        assert_eq!(current(table.len_signal()).await, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_change_under_paginate_keeps_page() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));
        table.next_page();
        settle().await;

        table.set_limit(Some(4));
        settle().await;

        assert_eq!(current(table.page_signal()).await, 2);
        assert_eq!(current(table.limit_signal()).await, Some(4));
        assert_eq!(current(table.rows_signal()).await, vec![5, 6, 7, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_under_scroll_restarts_accumulation() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Scroll), numbers(20, calls.clone()));
        settle().await;
        for _ in 0..2 {
            table.scroll();
            settle().await;
        }

        table.refresh();
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
        assert_eq!(current(table.page_signal()).await, 1);

        // Already on page 1: the same batch is fetched again and shown again
        table.refresh();
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
        assert_eq!(call_count(&calls), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_under_paginate_refetches_current_page() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));
        table.next_page();
        settle().await;

        table.refresh();
        settle().await;

        assert_eq!(call_count(&calls), 3);
        assert_eq!(last_call(&calls).skip, Some(3));
        assert_eq!(current(table.page_signal()).await, 2);
        assert_eq!(current(table.rows_signal()).await, vec![4, 5, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_first_page() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));
        table.jump_to_page(3);
        settle().await;

        table.reset();
        settle().await;
        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
        assert!(!current(table.initial_state_signal()).await);
        assert_eq!(call_count(&calls), 3);

        table.reset();
        settle().await;
        assert_eq!(call_count(&calls), 4);
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategy_transitions() {
        let calls = Calls::default();
        let table = Table::with_source(config(None, PaginationStrategy::Scroll), numbers(25, calls.clone()));
        settle().await;
        table.scroll();
        settle().await;
        assert_eq!(current(table.len_signal()).await, 20);

        table.set_strategy(PaginationStrategy::Paginate);
        settle().await;
        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(current(table.rows_signal()).await, (1..=10).collect::<Vec<_>>());

        table.set_strategy(PaginationStrategy::None);
        settle().await;
        assert_eq!(last_call(&calls).window(), None);
        assert_eq!(current(table.len_signal()).await, 25);

        table.set_strategy(PaginationStrategy::Scroll);
        settle().await;
        assert_eq!(current(table.rows_signal()).await, (1..=10).collect::<Vec<_>>());
        assert_eq!(current(table.strategy_signal()).await, PaginationStrategy::Scroll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_paginate_returns_to_first_page() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));
        settle().await;
        table.jump_to_page(3);
        settle().await;
        assert_eq!(current(table.rows_signal()).await, vec![7, 8, 9]);

        table.set_strategy(PaginationStrategy::None);
        settle().await;

        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(last_call(&calls).skip, Some(0));
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
        assert_eq!(call_count(&calls), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_replacement_under_scroll_restarts() {
        let table = Table::with_source(config(Some(3), PaginationStrategy::Scroll), numbers(20, Calls::default()));
        settle().await;
        table.scroll();
        settle().await;

        table.set_source(|params: &QueryParams| {
            let rows: Vec<u32> = select_rows(20, params).into_iter().map(|row| row * 100).collect();
            stream::iter([Ok::<_, String>(rows)])
        });
        settle().await;

        assert_eq!(current(table.rows_signal()).await, vec![100, 200, 300]);
        assert_eq!(current(table.page_signal()).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_batch_is_not_appended() {
        let table = Table::with_source(config(Some(3), PaginationStrategy::Scroll), |params: &QueryParams| {
            let rows = select_rows(20, params);
            stream::once(async move {
                sleep(Duration::from_millis(100)).await;
                Ok::<_, String>(rows)
            })
        });
        sleep(Duration::from_millis(150)).await;

        table.scroll();
        sleep(Duration::from_millis(50)).await;
        table.set_sort(Some(Sort::desc("id")));
        sleep(Duration::from_millis(200)).await;

        assert_eq!(current(table.rows_signal()).await, vec![20, 19, 18]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_rows() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), {
            let fail = fail.clone();
            move |params: &QueryParams| {
                let result = if fail.load(std::sync::atomic::Ordering::SeqCst) {
                    Err("offline".to_string())
                } else {
                    Ok(select_rows(20, params))
                };
                stream::iter([result])
            }
        });
        settle().await;

        fail.store(true, std::sync::atomic::Ordering::SeqCst);
        table.next_page();
        settle().await;

        assert!(current(table.has_error_signal()).await);
        assert_eq!(current(table.error_signal()).await, Some("offline".to_string()));
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
        assert!(!current(table.loading_signal()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_interval_refetches_current_page() {
        let calls = Calls::default();
        let table = Table::with_source(
            TableConfig {
                refresh_interval_seconds: Some(1.0),
                ..config(Some(3), PaginationStrategy::Paginate)
            },
            numbers(20, calls.clone()),
        );

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(call_count(&calls), 3);

        table.set_refresh_interval(None);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(call_count(&calls), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ignores_later_commands() {
        let calls = Calls::default();
        let table = Table::with_source(config(Some(3), PaginationStrategy::Paginate), numbers(20, calls.clone()));
        settle().await;

        table.close();
        table.next_page();
        table.refresh();
        settle().await;

        assert_eq!(call_count(&calls), 1);
        assert_eq!(current(table.page_signal()).await, 1);
        assert_eq!(current(table.rows_signal()).await, vec![1, 2, 3]);
    }
}
