//! Table discovery for the network's hourly report pages.
//!
//! Pages carry several tables (navigation, legends, the data grid) and their
//! order shifts between pollutants and snapshots. Each table is flattened into
//! a [`Grid`] of trimmed cell text, then a list of named [`TableStrategy`]
//! implementations proposes candidates in priority order. The first candidate
//! whose header row resolves wins.

use crate::error::{AppError, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Header rows are searched only among the first few rows of a table.
const HEADER_SCAN_ROWS: usize = 3;

/// A table whose first row has more header cells than this is a data grid.
const WIDE_HEADER_MIN_CELLS: usize = 5;

const HOUR_LABEL: &str = "hora";
const DATE_LABEL: &str = "fecha";

pub struct Selectors {
    table: Selector,
    row: Selector,
    body: Selector,
}

impl Selectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: parse_selector("table")?,
            row: parse_selector("tr")?,
            body: parse_selector("body")?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Parse(format!("Selector error: {:?}", e)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub header: bool,
}

impl Cell {
    pub fn header(text: &str) -> Self {
        Self {
            text: text.to_string(),
            header: true,
        }
    }

    pub fn data(text: &str) -> Self {
        Self {
            text: text.to_string(),
            header: false,
        }
    }
}

pub type Row = Vec<Cell>;

/// Flattened text content of one `<table>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub rows: Vec<Row>,
}

impl Grid {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    fn first_data_row(&self) -> Option<&Row> {
        self.rows
            .iter()
            .find(|row| row.iter().any(|cell| !cell.header))
    }
}

/// Flatten every table in the document, in document order.
pub fn collect_grids(document: &Html, selectors: &Selectors) -> Vec<Grid> {
    document
        .select(&selectors.table)
        .map(|table| grid_from_table(table, selectors))
        .collect()
}

/// Rows belong to the nearest enclosing table only, so a layout table that
/// wraps the data table does not absorb its rows.
fn grid_from_table(table: ElementRef<'_>, selectors: &Selectors) -> Grid {
    let rows = table
        .select(&selectors.row)
        .filter(|row| owning_table(*row).map(|owner| owner.id()) == Some(table.id()))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| is_cell(*cell))
                .map(|cell| Cell {
                    text: normalize_ws(&cell.text().collect::<String>()),
                    header: cell.value().name().eq_ignore_ascii_case("th"),
                })
                .collect()
        })
        .collect();
    Grid { rows }
}

fn owning_table(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name().eq_ignore_ascii_case("table"))
}

fn is_cell(el: ElementRef<'_>) -> bool {
    let name = el.value().name();
    name.eq_ignore_ascii_case("td") || name.eq_ignore_ascii_case("th")
}

/// Visible text of the page body, skipping `<script>` and `<style>` contents.
pub fn page_text(document: &Html, selectors: &Selectors) -> String {
    let root = document
        .select(&selectors.body)
        .next()
        .unwrap_or_else(|| document.root_element());

    root.descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            let hidden = matches!(parent.value().name(), "script" | "style" | "noscript");
            (!hidden).then(|| text.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse runs of whitespace (including `&nbsp;`) into single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Proposes the index of the table most likely to hold the data.
pub trait TableStrategy {
    fn name(&self) -> &'static str;
    fn select(&self, grids: &[Grid]) -> Option<usize>;
}

/// The table with the most rows; ties go to the first.
pub struct MostRows;

impl TableStrategy for MostRows {
    fn name(&self) -> &'static str {
        "most-rows"
    }

    fn select(&self, grids: &[Grid]) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, grid) in grids.iter().enumerate() {
            let rows = grid.rows.len();
            if rows == 0 {
                continue;
            }
            match best {
                Some((_, best_rows)) if best_rows >= rows => {}
                _ => best = Some((index, rows)),
            }
        }
        best.map(|(index, _)| index)
    }
}

/// The first table whose opening row is a wide run of `<th>` cells.
pub struct WideHeader;

impl TableStrategy for WideHeader {
    fn name(&self) -> &'static str {
        "wide-header"
    }

    fn select(&self, grids: &[Grid]) -> Option<usize> {
        grids.iter().position(|grid| {
            grid.first_row()
                .map(|row| row.iter().filter(|cell| cell.header).count() > WIDE_HEADER_MIN_CELLS)
                .unwrap_or(false)
        })
    }
}

/// The table with the most `<td>` cells in its first data row.
pub struct DenseFirstDataRow;

impl TableStrategy for DenseFirstDataRow {
    fn name(&self) -> &'static str {
        "dense-first-data-row"
    }

    fn select(&self, grids: &[Grid]) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, grid) in grids.iter().enumerate() {
            let cells = grid
                .first_data_row()
                .map(|row| row.iter().filter(|cell| !cell.header).count())
                .unwrap_or(0);
            if cells == 0 {
                continue;
            }
            match best {
                Some((_, best_cells)) if best_cells >= cells => {}
                _ => best = Some((index, cells)),
            }
        }
        best.map(|(index, _)| index)
    }
}

/// Last resort: the second table, else the first.
pub struct Positional;

impl TableStrategy for Positional {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn select(&self, grids: &[Grid]) -> Option<usize> {
        match grids.len() {
            0 => None,
            1 => Some(0),
            _ => Some(1),
        }
    }
}

pub const DEFAULT_STRATEGIES: &[&dyn TableStrategy] =
    &[&MostRows, &WideHeader, &DenseFirstDataRow, &Positional];

#[derive(Debug, Clone, PartialEq)]
pub struct StationColumn {
    pub label: String,
    pub index: usize,
}

/// Column layout of a data table.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub row_index: usize,
    pub hour_col: usize,
    pub date_col: Option<usize>,
    pub stations: Vec<StationColumn>,
}

impl Header {
    /// Keep only the column whose label equals `station` exactly.
    pub fn restrict_to(&mut self, station: &str) {
        self.stations.retain(|column| column.label == station);
    }
}

/// Find the header row among the first rows of `grid`.
///
/// The hour column is required; the date column is optional. Every non-empty
/// cell after the hour column names a station.
/// A row that mentions the hour but names no stations (a title such as
/// "Reporte horario") is not the header; scanning continues below it.
pub fn resolve_header(grid: &Grid) -> Option<Header> {
    for (row_index, row) in grid.rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let labels: Vec<String> = row.iter().map(|cell| cell.text.to_lowercase()).collect();

        let Some(hour_col) = labels.iter().position(|label| label.contains(HOUR_LABEL)) else {
            continue;
        };

        let date_col = labels
            .iter()
            .enumerate()
            .find(|(index, label)| *index != hour_col && label.contains(DATE_LABEL))
            .map(|(index, _)| index);

        let stations: Vec<StationColumn> = row
            .iter()
            .enumerate()
            .skip(hour_col + 1)
            .filter(|(index, cell)| Some(*index) != date_col && !cell.text.is_empty())
            .map(|(index, cell)| StationColumn {
                label: cell.text.clone(),
                index,
            })
            .collect();

        if stations.is_empty() {
            debug!("Row {} mentions the hour but has no station columns", row_index);
            continue;
        }

        return Some(Header {
            row_index,
            hour_col,
            date_col,
            stations,
        });
    }
    None
}

/// The chosen data table and its resolved header.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub strategy: &'static str,
    pub table_index: usize,
    pub header: Header,
}

/// Run `strategies` in order and return the first candidate with a resolvable header.
pub fn select_table(grids: &[Grid], strategies: &[&dyn TableStrategy]) -> Option<Selection> {
    let mut tried = Vec::new();

    for strategy in strategies {
        let Some(table_index) = strategy.select(grids) else {
            debug!("Strategy '{}' found no candidate table", strategy.name());
            continue;
        };

        if tried.contains(&table_index) {
            continue;
        }
        tried.push(table_index);

        match resolve_header(&grids[table_index]) {
            Some(header) => {
                debug!(
                    "Strategy '{}' selected table {} (header row {}, hour column {}, {} station columns)",
                    strategy.name(),
                    table_index,
                    header.row_index,
                    header.hour_col,
                    header.stations.len()
                );
                return Some(Selection {
                    strategy: strategy.name(),
                    table_index,
                    header,
                });
            }
            None => {
                debug!(
                    "Strategy '{}' proposed table {} but no hour column was found",
                    strategy.name(),
                    table_index
                );
            }
        }
    }

    None
}
