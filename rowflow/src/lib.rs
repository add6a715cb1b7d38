//! Reactive data sources for list and table views.
//!
//! Three layers, each built on the one below:
//!
//! - [`Trigger`] - restartable periodic timer merged with manual refreshes
//! - [`DataSource`] - re-runs an async source on every pulse and tracks
//!   data, loading, error and initial state
//! - [`PaginatedTable`] - page, limit, sort and strategy state plus row
//!   accumulation on top of a [`DataSource`]
//!
//! Every component is an Actor (see [`dataflow`]): mutators enqueue commands,
//! state is read through `futures-signals` signals. All constructors spawn
//! tasks and must run inside a tokio runtime.

pub mod data_source;
pub mod dataflow;
pub mod table;
pub mod trigger;

pub use data_source::{DataSource, DataSourceConfig, SourceFactory, SourceState, SourceStream};
pub use table::{PaginatedTable, QuerySource, TableState};
pub use trigger::{ExecutePulse, MIN_REFRESH_INTERVAL, Trigger};

pub use shared::{
    ConfigError, FALLBACK_PAGE_LIMIT, PageWindow, PaginationStrategy, QueryParams, Sort,
    SortDirection, TableConfig,
};
