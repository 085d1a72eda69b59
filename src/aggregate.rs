use crate::classify::category_for;
use crate::models::{Aggregate, HourlyAverage, Observation, StationGroups, StationSummary};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Round to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Group observations by station and average them per (date, hour).
///
/// Missing readings count toward neither the sum nor the station count, and a
/// slot with no numeric readings is left out entirely.
pub fn aggregate(observations: &[Observation]) -> Aggregate {
    let mut stations = StationGroups::new();
    let mut slots: BTreeMap<(NaiveDate, u32), (f64, usize)> = BTreeMap::new();

    for obs in observations {
        stations
            .entry(obs.station.clone())
            .or_default()
            .push(obs.clone());

        if let Some(value) = obs.value {
            let slot = slots.entry((obs.date, obs.hour)).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }

    let hourly_averages = slots
        .into_iter()
        .map(|((date, hour), (sum, count))| HourlyAverage {
            date,
            hour,
            value: round1(sum / count as f64),
            station_count: count,
        })
        .collect();

    Aggregate {
        stations,
        hourly_averages,
    }
}

/// Per-station reading counts and min/max/mean, with the category of the peak.
pub fn summarize_stations(aggregate: &Aggregate) -> Vec<StationSummary> {
    aggregate
        .stations
        .iter()
        .map(|(station, observations)| {
            let values: Vec<f64> = observations.iter().filter_map(|obs| obs.value).collect();
            let missing = observations.len() - values.len();

            let min = values.iter().copied().reduce(f64::min);
            let max = values.iter().copied().reduce(f64::max);
            let mean = (!values.is_empty())
                .then(|| round1(values.iter().sum::<f64>() / values.len() as f64));

            let peak_category = max.and_then(|peak| {
                observations
                    .first()
                    .map(|obs| category_for(&obs.parameter, peak).label())
            });

            StationSummary {
                station: station.clone(),
                readings: observations.len(),
                missing,
                min,
                max,
                mean,
                peak_category,
            }
        })
        .collect()
}
