use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ===== PAGINATION TYPES =====

/// Rows per page used when a paginating strategy is active but no limit was set.
pub const FALLBACK_PAGE_LIMIT: usize = 10;

/// How a table acquires rows from its source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStrategy {
    /// Single unconstrained batch, replaced on every fetch.
    #[default]
    None,
    /// Discrete pages, each fetch replaces the rows.
    Paginate,
    /// Pages are appended to the rows as the user scrolls.
    Scroll,
}

impl PaginationStrategy {
    pub fn is_paginating(self) -> bool {
        matches!(self, Self::Paginate | Self::Scroll)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sort {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

/// Row window requested from a source: `take` rows after skipping `skip`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageWindow {
    pub skip: usize,
    pub take: usize,
}

/// Derives the row window for `page` (1-indexed).
///
/// Paginating strategies without a limit fall back to [`FALLBACK_PAGE_LIMIT`];
/// `PaginationStrategy::None` without a limit requests everything (`None`).
pub fn page_window(limit: Option<usize>, page: usize, strategy: PaginationStrategy) -> Option<PageWindow> {
    let limit = match limit {
        Some(limit) => limit,
        None if strategy.is_paginating() => FALLBACK_PAGE_LIMIT,
        None => return None,
    };
    Some(PageWindow {
        skip: page.max(1).saturating_sub(1).saturating_mul(limit),
        take: limit,
    })
}

// ===== QUERY PARAMETERS =====

/// Key-value constraints handed to a table's source function.
///
/// Every key is optional; a missing key means "no constraint".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
}

impl QueryParams {
    pub fn new(window: Option<PageWindow>, sort: Option<&Sort>) -> Self {
        Self {
            skip: window.map(|window| window.skip),
            take: window.map(|window| window.take),
            sort_by: sort.map(|sort| sort.column.clone()),
            sort_direction: sort.map(|sort| sort.direction),
        }
    }

    /// The requested window, present only when both `skip` and `take` are set.
    pub fn window(&self) -> Option<PageWindow> {
        Some(PageWindow {
            skip: self.skip?,
            take: self.take?,
        })
    }

    pub fn sort(&self) -> Option<Sort> {
        let column = self.sort_by.clone()?;
        Some(Sort::new(column, self.sort_direction.unwrap_or_default()))
    }

    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.take.is_none() && self.sort_by.is_none() && self.sort_direction.is_none()
    }

    /// String-valued pairs in wire order, e.g. for building a URL query string.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }
        if let Some(take) = self.take {
            pairs.push(("take", take.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            pairs.push(("sortBy", sort_by.clone()));
        }
        if let Some(direction) = self.sort_direction {
            pairs.push(("sortDirection", direction.as_str().to_string()));
        }
        pairs
    }
}

// ===== CONFIGURATION =====

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse table config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Construction-time settings for a paginated table.
///
/// ```toml
/// refresh_interval_seconds = 30.0
/// page = 1
/// limit = 25
/// strategy = "scroll"
/// sort = { column = "name", direction = "desc" }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    /// `None` or non-positive disables automatic refresh.
    pub refresh_interval_seconds: Option<f64>,
    pub page: usize,
    pub limit: Option<usize>,
    pub strategy: PaginationStrategy,
    pub sort: Option<Sort>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: None,
            page: 1,
            limit: None,
            strategy: PaginationStrategy::None,
            sort: None,
        }
    }
}

impl TableConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        seconds_to_duration(self.refresh_interval_seconds)
    }

    /// Configured page clamped to the 1-indexed floor.
    pub fn initial_page(&self) -> usize {
        self.page.max(1)
    }
}

/// Converts an optional seconds value, treating non-finite or non-positive input as unset.
pub fn seconds_to_duration(seconds: Option<f64>) -> Option<Duration> {
    seconds
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
}
