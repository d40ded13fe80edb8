//! Tables over result rows and tasks
//!
//! A [`Column`] is either a plain field lookup or a computed cell. Columns
//! are resolved per row by matching the variant; rows only need to expose
//! their fields through [`Fields`].

use serde::Serialize;
use serde_json::Value;

use crate::config::TableConfig;
use crate::pagination::{self, Pagination};
use crate::tasks::{ResultRow, Task};

/// Field access by name
pub trait Fields {
    fn field(&self, key: &str) -> Option<Value>;
}

impl Fields for ResultRow {
    fn field(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

impl Fields for Task {
    fn field(&self, key: &str) -> Option<Value> {
        let value = match key {
            "id" => Value::from(self.id.as_str()),
            "userId" => Value::from(self.user_id.as_str()),
            "website" => Value::from(self.website.as_str()),
            "status" => Value::from(self.status.as_str()),
            "notified" => Value::from(self.notified),
            "createdAt" => Value::from(self.created_at.to_rfc3339()),
            "completedAt" => Value::from(self.completed_at?.to_rfc3339()),
            "items" => Value::from(self.items?),
            "searchTerm" => Value::from(self.search_term.clone()?),
            "searchLocation" => Value::from(self.search_location.clone()?),
            "resultsLimit" => Value::from(self.results_limit?),
            "error" => Value::from(self.error.clone()?),
            _ => return None,
        };
        Some(value)
    }
}

type Render<R> = Box<dyn Fn(&R) -> String + Send + Sync>;

pub enum Column<R> {
    Field { header: String, key: String },
    Computed { header: String, render: Render<R> },
}

impl<R: Fields> Column<R> {
    pub fn field(header: impl Into<String>, key: impl Into<String>) -> Self {
        Column::Field {
            header: header.into(),
            key: key.into(),
        }
    }

    pub fn computed(
        header: impl Into<String>,
        render: impl Fn(&R) -> String + Send + Sync + 'static,
    ) -> Self {
        Column::Computed {
            header: header.into(),
            render: Box::new(render),
        }
    }

    pub fn header(&self) -> &str {
        match self {
            Column::Field { header, .. } | Column::Computed { header, .. } => header,
        }
    }

    pub fn render(&self, row: &R) -> String {
        match self {
            Column::Field { key, .. } => row.field(key).map(cell_text).unwrap_or_default(),
            Column::Computed { render, .. } => render(row),
        }
    }
}

/// Strings render bare, null as empty, everything else as JSON
pub fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pager position. Changing the page size goes back to page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    page_size: usize,
    current_page: usize,
    sibling_count: usize,
    page_size_options: Vec<usize>,
}

impl TableState {
    pub fn new(config: &TableConfig) -> Self {
        Self {
            page_size: config.default_page_size.max(1),
            current_page: 1,
            sibling_count: config.sibling_count,
            page_size_options: config.page_size_options.clone(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Returns false (and changes nothing) for a size not on offer
    pub fn set_page_size(&mut self, size: usize) -> bool {
        if !self.page_size_options.contains(&size) {
            return false;
        }
        self.page_size = size;
        self.current_page = 1;
        true
    }

    /// Move to `page`, clamped to `[1, total_pages]` for `total_items`
    pub fn go_to(&mut self, page: usize, total_items: usize) {
        let last = pagination::total_pages(total_items, self.page_size).max(1);
        self.current_page = page.clamp(1, last);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePage {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub pagination: Pagination,
    pub current_page: usize,
    /// 1-based first and last row shown; `None` for an empty table
    pub range: Option<(usize, usize)>,
    pub total: usize,
}

impl TablePage {
    pub fn summary(&self) -> String {
        match self.range {
            Some((first, last)) => format!("Showing {first} to {last} of {} results", self.total),
            None => "No results".to_string(),
        }
    }
}

/// Render the page of `rows` selected by `state`
pub fn render_page<R: Fields>(columns: &[Column<R>], rows: &[R], state: &TableState) -> TablePage {
    let total = rows.len();
    let last_page = pagination::total_pages(total, state.page_size).max(1);
    let current = state.current_page.clamp(1, last_page);

    let start = (current - 1) * state.page_size;
    let end = (start + state.page_size).min(total);
    let visible = rows.get(start..end).unwrap_or_default();

    TablePage {
        headers: columns.iter().map(|c| c.header().to_string()).collect(),
        rows: visible
            .iter()
            .map(|row| columns.iter().map(|c| c.render(row)).collect())
            .collect(),
        pagination: pagination::paginate(total, state.page_size, current, state.sibling_count),
        current_page: current,
        range: (start < end).then_some((start + 1, end)),
        total,
    }
}
