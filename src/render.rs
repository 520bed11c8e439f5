//! Plain-text rendering of the batch and result tables for the terminal.

use std::fmt::Write as _;

use colored::Colorize;

use crate::builder::InputMode;
use crate::error::{DispatchError, FieldError};
use crate::present::{GroupTable, ResultsView, SortDirection, hex_to_rgb, row_color};
use crate::response::{Column, ResultRow};
use crate::schema::QueryBatch;

const MAX_CELL_WIDTH: usize = 28;

pub fn render_batch(batch: &QueryBatch, mode: InputMode) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "mode={} endpoint={} consensus={} records={}",
        mode,
        batch.endpoint,
        if batch.consensus { "True" } else { "False" },
        batch.len()
    );
    for (index, record) in batch.practitioners.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{index}] first_name={:?} last_name={:?} npi={:?}",
            record.first_name, record.last_name, record.npi
        );
    }
    out
}

pub fn render_field_errors(errors: &[FieldError]) -> String {
    let mut out = String::from("Cannot submit:\n");
    for err in errors {
        let _ = writeln!(out, "  - {err}");
    }
    out
}

pub fn render_dispatch_error(err: &DispatchError) -> String {
    format!("{} {}\n", "Error:".red().bold(), err)
}

pub fn render_results(view: &ResultsView) -> String {
    if view.tables().is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::from("Search Results:\n");
    for table in view.tables() {
        out.push_str(&render_table(table, view.is_expanded(table.key())));
    }
    out
}

pub fn render_table(table: &GroupTable, expanded: bool) -> String {
    let mut out = String::new();
    let marker = if expanded { "[-]" } else { "[+]" };
    let _ = write!(
        out,
        "{} {} ({} rows",
        marker,
        table.key().bold(),
        table.len()
    );
    if !expanded {
        out.push_str(", collapsed)\n");
        return out;
    }
    let _ = write!(out, ", page {}/{}", table.page() + 1, table.page_count());
    if let Some(sort) = table.sort() {
        let arrow = match sort.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        let _ = write!(out, ", sorted by {} {}", sort.column, arrow);
    }
    out.push_str(")\n");

    let rows: Vec<&ResultRow> = table.page_rows().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| Column::ALL.iter().map(|c| clip(&row.cell_text(*c))).collect())
        .collect();
    let widths: Vec<usize> = Column::ALL
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.header().chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = Column::ALL
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad(c.header(), *w))
        .collect();
    let _ = writeln!(out, "  {}", header.join(" | ").bold());

    for (row, row_cells) in rows.iter().zip(&cells) {
        let line: Vec<String> = row_cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect();
        let line = line.join(" | ");
        match row_color(row.endpoint()).and_then(hex_to_rgb) {
            Some((r, g, b)) => {
                let _ = writeln!(out, "  {}", line.truecolor(0, 0, 0).on_truecolor(r, g, b));
            }
            None => {
                let _ = writeln!(out, "  {line}");
            }
        }
    }
    out
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        text.to_string()
    } else {
        let kept: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{kept}…")
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{text}{}", " ".repeat(width.saturating_sub(len)))
}
