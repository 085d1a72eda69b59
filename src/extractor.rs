use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::{HourlyRequest, Observation};
use crate::parameter::canonical_code;
use crate::table::{collect_grids, page_text, select_table, Selectors, DEFAULT_STRATEGIES};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use regex_lite::Regex;
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Cell contents the network uses in place of a reading.
const MISSING_TOKENS: [&str; 8] = ["", "-", "n/d", "nr", "nv", "**", "na", "n/a"];

/// Day used when neither the request nor the page names one.
const DEFAULT_DAY: u32 = 1;

/// Why an extraction produced what it did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum ExtractOutcome {
    Extracted,
    InvalidRequest(String),
    NoTables,
    HeaderNotResolved,
    StationNotFound,
    NoRowsAfterFiltering,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractStats {
    pub tables_found: usize,
    pub table_index: Option<usize>,
    pub strategy: Option<&'static str>,
    pub station_columns: usize,
    pub rows_scanned: usize,
    pub rows_emitted: usize,
    pub invalid_hour_rows: usize,
    pub hour_filtered_rows: usize,
    pub future_rows: usize,
    pub undated_rows: usize,
    pub missing_cells: usize,
    pub unparseable_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub outcome: ExtractOutcome,
    pub stats: ExtractStats,
    pub observations: Vec<Observation>,
}

impl Extraction {
    fn new() -> Self {
        Self {
            outcome: ExtractOutcome::Extracted,
            stats: ExtractStats::default(),
            observations: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ExtractOutcome::Extracted
    }
}

/// Parsed and validated request values.
struct Filters {
    year: i32,
    month: u32,
    day: Option<u32>,
    hour: Option<u32>,
}

impl Filters {
    fn from_request(request: &HourlyRequest) -> std::result::Result<Self, String> {
        let year = request
            .year
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("Invalid year '{}'", request.year))?;

        let month = request
            .month
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| format!("Invalid month '{}'", request.month))?;

        let day = match request.day.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(
                text.parse::<u32>()
                    .ok()
                    .filter(|d| (1..=31).contains(d))
                    .ok_or_else(|| format!("Invalid day '{}'", text))?,
            ),
        };

        if let Some(hour) = request.hour {
            if hour > 23 {
                return Err(format!("Invalid hour {}", hour));
            }
        }

        Ok(Self {
            year,
            month,
            day,
            hour: request.hour,
        })
    }
}

struct Patterns {
    date: Regex,
    integer: Regex,
    day_fragment: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            date: compile(r"(\d{1,4})\s*[/.\-]\s*(\d{1,4})\s*[/.\-]\s*(\d{1,4})")?,
            integer: compile(r"\d+")?,
            day_fragment: compile(r"(?i)\b(?:d[iíÍ]a|day)\s*[:=]?\s*(\d{1,2})\b")?,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Parse(format!("Regex error: {}", e)))
}

/// Parse an hourly report page into observations.
///
/// Never panics and never returns an error: anything that prevents
/// extraction is reported through [`Extraction::outcome`], and whatever was
/// collected before the problem is kept. The clock is read once.
pub fn extract(markup: &str, request: &HourlyRequest, clock: &dyn Clock) -> Extraction {
    let now = clock.now();
    let mut extraction = Extraction::new();

    match extract_into(markup, request, now, &mut extraction) {
        Ok(outcome) => extraction.outcome = outcome,
        Err(e) => {
            warn!(
                "Extraction stopped after {} observations: {}",
                extraction.observations.len(),
                e
            );
            extraction.outcome = ExtractOutcome::Failed(e.to_string());
        }
    }

    extraction
}

/// [`extract`] without the diagnostics.
pub fn extract_observations(
    markup: &str,
    request: &HourlyRequest,
    clock: &dyn Clock,
) -> Vec<Observation> {
    extract(markup, request, clock).observations
}

fn extract_into(
    markup: &str,
    request: &HourlyRequest,
    now: NaiveDateTime,
    extraction: &mut Extraction,
) -> Result<ExtractOutcome> {
    let filters = match Filters::from_request(request) {
        Ok(filters) => filters,
        Err(reason) => {
            warn!("Rejecting request: {}", reason);
            return Ok(ExtractOutcome::InvalidRequest(reason));
        }
    };

    let selectors = Selectors::new()?;
    let patterns = Patterns::new()?;

    let document = Html::parse_document(markup);
    let grids = collect_grids(&document, &selectors);
    extraction.stats.tables_found = grids.len();

    if grids.is_empty() {
        warn!("No tables found in {} bytes of markup", markup.len());
        return Ok(ExtractOutcome::NoTables);
    }

    let Some(selection) = select_table(&grids, DEFAULT_STRATEGIES) else {
        warn!(
            "No hour column found in any of {} candidate tables",
            grids.len()
        );
        return Ok(ExtractOutcome::HeaderNotResolved);
    };

    extraction.stats.table_index = Some(selection.table_index);
    extraction.stats.strategy = Some(selection.strategy);

    let mut header = selection.header;
    if let Some(station) = request.station.as_deref() {
        header.restrict_to(station);
        if header.stations.is_empty() {
            warn!("Station '{}' not present in table header", station);
            return Ok(ExtractOutcome::StationNotFound);
        }
    }
    extraction.stats.station_columns = header.stations.len();

    let day = filters.day.unwrap_or_else(|| {
        let text = page_text(&document, &selectors);
        day_from_text(&text, &patterns).unwrap_or(DEFAULT_DAY)
    });
    let mut current_date = NaiveDate::from_ymd_opt(filters.year, filters.month, day);
    if current_date.is_none() {
        debug!(
            "Day context {}-{:02}-{:02} is not a calendar date",
            filters.year, filters.month, day
        );
    }

    let parameter = canonical_code(&request.parameter);
    let grid = &grids[selection.table_index];

    for (row_number, row) in grid.rows.iter().enumerate().skip(header.row_index + 1) {
        let stats = &mut extraction.stats;
        stats.rows_scanned += 1;

        if let Some(date) = header
            .date_col
            .and_then(|col| row.get(col))
            .and_then(|cell| parse_date(&cell.text, &patterns))
        {
            current_date = Some(date);
        }

        let Some(date) = current_date else {
            stats.undated_rows += 1;
            debug!("Row {}: no date could be resolved, skipping", row_number);
            continue;
        };

        let Some(hour) = row
            .get(header.hour_col)
            .and_then(|cell| parse_hour(&cell.text, &patterns))
        else {
            stats.invalid_hour_rows += 1;
            debug!("Row {}: no valid hour, skipping", row_number);
            continue;
        };

        if filters.hour.is_some_and(|wanted| wanted != hour) {
            stats.hour_filtered_rows += 1;
            continue;
        }

        if is_future(date, hour, now) {
            stats.future_rows += 1;
            debug!("Row {}: {} {:02}:00 is in the future, skipping", row_number, date, hour);
            continue;
        }

        let before = extraction.observations.len();
        for column in &header.stations {
            let Some(cell) = row.get(column.index) else {
                continue;
            };

            let (value, raw_value) = match read_cell(&cell.text) {
                CellValue::Missing(token) => {
                    extraction.stats.missing_cells += 1;
                    (None, token)
                }
                CellValue::Number(value) => (Some(value), value.to_string()),
                CellValue::Unparseable => {
                    extraction.stats.unparseable_cells += 1;
                    debug!(
                        "Row {}: dropping unparseable value '{}' for {}",
                        row_number, cell.text, column.label
                    );
                    continue;
                }
            };

            extraction.observations.push(Observation {
                date,
                hour,
                station: column.label.clone(),
                parameter: parameter.clone(),
                value,
                raw_value,
            });
        }

        if extraction.observations.len() > before {
            extraction.stats.rows_emitted += 1;
        }
    }

    info!(
        "Extracted {} observations for {} from table {} ({} rows scanned)",
        extraction.observations.len(),
        parameter,
        selection.table_index,
        extraction.stats.rows_scanned
    );

    if extraction.observations.is_empty() {
        return Ok(ExtractOutcome::NoRowsAfterFiltering);
    }
    Ok(ExtractOutcome::Extracted)
}

#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Missing(String),
    Number(f64),
    Unparseable,
}

fn read_cell(text: &str) -> CellValue {
    let trimmed = text.trim();

    if MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
    {
        return CellValue::Missing(trimmed.to_uppercase());
    }

    let numeric: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    match numeric.parse::<f64>() {
        Ok(value) if value.is_finite() => CellValue::Number(value),
        _ => CellValue::Unparseable,
    }
}

/// First integer in the cell, if it is a valid hour of day.
fn parse_hour(text: &str, patterns: &Patterns) -> Option<u32> {
    let token = patterns.integer.find(text)?;
    let hour = token.as_str().parse::<u32>().ok()?;
    (hour <= 23).then_some(hour)
}

/// Parse a `N/N/N` date, deciding field order by magnitude.
///
/// A field above 31 can only be the year. With no such field the order is
/// month/day/year; a four-digit year in last place reads as day/month/year.
/// Two-digit years are taken as 20YY.
fn parse_date(text: &str, patterns: &Patterns) -> Option<NaiveDate> {
    let caps = patterns.date.captures(text)?;
    let a = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let b = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let c = caps.get(3)?.as_str().parse::<u32>().ok()?;

    let (year, month, day) = if a > 31 {
        let (month, day) = month_day(b, c);
        (a, month, day)
    } else if c > 31 {
        let (month, day) = month_day(b, a);
        (c, month, day)
    } else if b > 31 {
        let (month, day) = month_day(c, a);
        (b, month, day)
    } else {
        (c, a, b)
    };

    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Returns `(month, day)`, swapping when the preferred month cannot be one.
fn month_day(month: u32, day: u32) -> (u32, u32) {
    if month > 12 && day <= 12 {
        (day, month)
    } else {
        (month, day)
    }
}

fn day_from_text(text: &str, patterns: &Patterns) -> Option<u32> {
    patterns
        .day_fragment
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find(|day| (1..=31).contains(day))
}

/// True when `(date, hour)` is later than the hour `now` falls in.
fn is_future(date: NaiveDate, hour: u32, now: NaiveDateTime) -> bool {
    (date, hour) > (now.date(), now.hour())
}
