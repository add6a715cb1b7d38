use shared::{PageWindow, PaginationStrategy, QueryParams, Sort, TableConfig, page_window};

/// Parameter state of a [`PaginatedTable`](super::PaginatedTable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    /// 1-indexed, never below 1.
    pub page: usize,
    pub limit: Option<usize>,
    pub strategy: PaginationStrategy,
    pub sort: Option<Sort>,
}

impl Default for TableState {
    fn default() -> Self {
        Self::from_config(&TableConfig::default())
    }
}

impl TableState {
    pub fn from_config(config: &TableConfig) -> Self {
        Self {
            page: config.initial_page(),
            limit: config.limit,
            strategy: config.strategy,
            sort: config.sort.clone(),
        }
    }

    pub fn pagination(&self) -> Option<PageWindow> {
        page_window(self.limit, self.page, self.strategy)
    }

    pub fn query_params(&self) -> QueryParams {
        QueryParams::new(self.pagination(), self.sort.as_ref())
    }

    pub fn is_paginated(&self) -> bool {
        self.strategy == PaginationStrategy::Paginate
    }

    pub fn is_scrolling(&self) -> bool {
        self.strategy == PaginationStrategy::Scroll
    }

    /// A jump discards the page history; `0` is clamped to the first page.
    pub(crate) fn jump_to(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub(crate) fn advance(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    /// Returns `false` when already on the first page.
    pub(crate) fn step_back(&mut self) -> bool {
        if self.page <= 1 {
            return false;
        }
        self.page -= 1;
        true
    }
}
