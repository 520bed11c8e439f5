//! Presentation model for a [`QueryResponse`]: one collapsible, sortable,
//! paginated table per group key, plus download and CSV export.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use csv::Writer;

use crate::common::{temp_path_for, write_atomically};
use crate::constants::{DOWNLOAD_FILE_NAME, ENDPOINT_COLORS};
use crate::error::{DownloadError, ExportError};
use crate::response::{Column, QueryResponse, ResultRow, compare_cells};

/// Background colour for a row, looked up by its `Endpoint` value.
pub fn row_color(endpoint: Option<&str>) -> Option<&'static str> {
    let endpoint = endpoint?;
    ENDPOINT_COLORS
        .iter()
        .find(|(name, _)| *name == endpoint)
        .map(|(_, color)| *color)
}

pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Expanded/collapsed flag per group key. Survives across responses so a
/// group that comes back under the same key keeps its state.
#[derive(Debug, Clone, Default)]
pub struct VisibilityState {
    expanded: HashMap<String, bool>,
}

impl VisibilityState {
    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.get(key).copied().unwrap_or(true)
    }

    pub fn set(&mut self, key: &str, expanded: bool) {
        self.expanded.insert(key.to_string(), expanded);
    }

    /// Flips one group and returns its new state.
    pub fn toggle(&mut self, key: &str) -> bool {
        let next = !self.is_expanded(key);
        self.set(key, next);
        next
    }

    pub fn sync_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.expanded.entry(key.to_string()).or_insert(true);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction {other:?} (expected asc or desc)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: Column,
    pub direction: SortDirection,
}

/// One group's table. Sorting and paging only reorder a view over the rows.
#[derive(Debug, Clone)]
pub struct GroupTable {
    key: String,
    rows: Vec<ResultRow>,
    order: Vec<usize>,
    sort: Option<SortState>,
    page: usize,
    page_size: usize,
}

impl GroupTable {
    pub fn new(key: impl Into<String>, rows: Vec<ResultRow>, page_size: usize) -> Self {
        let order = (0..rows.len()).collect();
        Self {
            key: key.into(),
            rows,
            order,
            sort: None,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn sort(&self) -> Option<SortState> {
        self.sort
    }

    pub fn sort_by(&mut self, column: Column, direction: SortDirection) {
        let rows = &self.rows;
        self.order.sort_by(|&a, &b| {
            let ord = compare_cells(rows[a].cell(column), rows[b].cell(column));
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
        self.sort = Some(SortState { column, direction });
        self.page = 0;
    }

    /// Header-click behaviour: a new column sorts ascending, the same column flips.
    pub fn toggle_sort(&mut self, column: Column) -> SortDirection {
        let direction = match self.sort {
            Some(SortState {
                column: current,
                direction: SortDirection::Ascending,
            }) if current == column => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        self.sort_by(column, direction);
        direction
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size).max(1)
    }

    /// Moves to `page` (zero-based), clamped to the last page.
    pub fn set_page(&mut self, page: usize) -> usize {
        self.page = page.min(self.page_count() - 1);
        self.page
    }

    pub fn sorted_rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.order.iter().map(|&i| &self.rows[i])
    }

    pub fn page_rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.sorted_rows()
            .skip(self.page * self.page_size)
            .take(self.page_size)
    }
}

/// All group tables for the live response plus the visibility map.
#[derive(Debug, Clone)]
pub struct ResultsView {
    tables: Vec<GroupTable>,
    visibility: VisibilityState,
    page_size: usize,
}

impl ResultsView {
    pub fn new(page_size: usize) -> Self {
        Self {
            tables: Vec::new(),
            visibility: VisibilityState::default(),
            page_size,
        }
    }

    /// Rebuilds the tables from `response`. Sort and page state start over;
    /// visibility is kept per key.
    pub fn load(&mut self, response: &QueryResponse) {
        self.tables = response
            .groups()
            .iter()
            .map(|g| GroupTable::new(g.key.clone(), g.rows.clone(), self.page_size))
            .collect();
        self.visibility.sync_keys(response.keys());
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn tables(&self) -> &[GroupTable] {
        &self.tables
    }

    pub fn table(&self, key: &str) -> Option<&GroupTable> {
        self.tables.iter().find(|t| t.key == key)
    }

    pub fn table_mut(&mut self, key: &str) -> Option<&mut GroupTable> {
        self.tables.iter_mut().find(|t| t.key == key)
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.visibility.is_expanded(key)
    }

    /// Toggles a loaded group; `None` if no such group is shown.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        self.table(key)?;
        Some(self.visibility.toggle(key))
    }

    pub fn visibility(&self) -> &VisibilityState {
        &self.visibility
    }
}

/// Writes the live response, verbatim and pretty-printed, to `dir/data.json`.
/// Refuses while a request is pending or before any success.
pub fn download_results(
    response: Option<&QueryResponse>,
    pending: bool,
    dir: &Path,
) -> Result<PathBuf, DownloadError> {
    if pending {
        return Err(DownloadError::RequestPending);
    }
    let response = response.ok_or(DownloadError::NoResponse)?;

    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source: std::io::Error| DownloadError::Io { path, source }
    };
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let output_path = dir.join(DOWNLOAD_FILE_NAME);
    let json = serde_json::to_string_pretty(response)?;
    write_atomically(&output_path, json.as_bytes()).map_err(io_err(&output_path))?;
    tracing::info!("wrote {} ({} groups)", output_path.display(), response.len());
    Ok(output_path)
}

/// Writes one table's rows, in the current sort order, as CSV.
pub fn export_table_csv(table: &GroupTable, output_path: &Path) -> Result<(), ExportError> {
    let io_err = |path: &Path, source: std::io::Error| ExportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp_path = temp_path_for(output_path);
    let written = write_table_csv(table, &tmp_path).and_then(|()| {
        fs::rename(&tmp_path, output_path).map_err(|e| io_err(output_path, e))
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    tracing::info!(
        "exported group {} ({} rows) to {}",
        table.key(),
        table.len(),
        output_path.display()
    );
    Ok(())
}

fn write_table_csv(table: &GroupTable, tmp_path: &Path) -> Result<(), ExportError> {
    let mut writer = Writer::from_path(tmp_path)?;
    writer.write_record(Column::ALL.iter().map(|c| c.header()))?;
    for row in table.sorted_rows() {
        writer.write_record(Column::ALL.iter().map(|c| row.cell_text(*c)))?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: tmp_path.display().to_string(),
        source,
    })
}

/// File name used when exporting every group into a directory.
pub fn export_file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{safe}.csv")
}
