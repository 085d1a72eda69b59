use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// What to ask the network for, and how to filter the rows it sends back.
///
/// `year` and `month` are kept as text since they come straight from the
/// command line or a saved page's query string; the extractor validates them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRequest {
    pub parameter: String,
    pub year: String,
    pub month: String,
    pub day: Option<String>,
    pub hour: Option<u32>,
    pub station: Option<String>,
}

impl HourlyRequest {
    pub fn new(parameter: &str, year: &str, month: &str) -> Self {
        Self {
            parameter: parameter.to_string(),
            year: year.to_string(),
            month: month.to_string(),
            day: None,
            hour: None,
            station: None,
        }
    }

    pub fn with_day(mut self, day: &str) -> Self {
        self.day = Some(day.to_string());
        self
    }

    pub fn with_hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }

    pub fn with_station(mut self, station: &str) -> Self {
        self.station = Some(station.to_string());
        self
    }
}

/// A single station reading for one pollutant at one hour.
///
/// `value` is `None` when the source cell held a missing-data token; the
/// token itself is kept in `raw_value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_hour")]
    pub hour: u32,
    pub station: String,
    pub parameter: String,
    pub value: Option<f64>,
    pub raw_value: String,
}

impl Observation {
    /// Zero-padded hour, e.g. `"08"`.
    pub fn hour_label(&self) -> String {
        format!("{:02}", self.hour)
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

fn serialize_hour<S>(hour: &u32, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{:02}", hour))
}

/// Cross-station mean for one (date, hour) slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyAverage {
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_hour")]
    pub hour: u32,
    pub value: f64,
    pub station_count: usize,
}

/// Observations per station label. Keys iterate (and serialize) in sorted
/// label order, not header column order; each group keeps source row order.
pub type StationGroups = BTreeMap<String, Vec<Observation>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub stations: StationGroups,
    pub hourly_averages: Vec<HourlyAverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSummary {
    pub station: String,
    pub readings: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub peak_category: Option<&'static str>,
}
