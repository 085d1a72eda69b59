use crate::aggregate::{aggregate, summarize_stations};
use crate::classify::{classify, Classification};
use crate::extractor::{ExtractOutcome, ExtractStats, Extraction};
use crate::models::{HourlyAverage, HourlyRequest, Observation, StationSummary};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedAverage {
    #[serde(flatten)]
    pub average: HourlyAverage,
    pub classification: Classification,
}

/// Everything the command line prints for one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub request: HourlyRequest,
    pub outcome: ExtractOutcome,
    pub stats: ExtractStats,
    pub observations: Vec<Observation>,
    pub hourly_averages: Vec<ClassifiedAverage>,
    pub stations: Vec<StationSummary>,
}

impl Report {
    pub fn build(request: HourlyRequest, extraction: Extraction) -> Self {
        let aggregate = aggregate(&extraction.observations);
        let stations = summarize_stations(&aggregate);
        let parameter = request.parameter.clone();

        let hourly_averages = aggregate
            .hourly_averages
            .into_iter()
            .map(|average| ClassifiedAverage {
                classification: classify(&parameter, average.value),
                average,
            })
            .collect();

        Self {
            request,
            outcome: extraction.outcome,
            stats: extraction.stats,
            observations: extraction.observations,
            hourly_averages,
            stations,
        }
    }
}
