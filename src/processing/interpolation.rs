//! Gap filling for ordered time series
//!
//! All methods are non-mutating on their input: they clone the entries and
//! only ever touch metric fields, never `timestamp` or `index`.

use crate::types::{Metric, TimeSeriesEntry};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Gap-filling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningMethod {
    /// Interpolate between the nearest known neighbours; hold the edge value
    /// where only one side is known.
    Linear,
    /// Carry the last known value forward; leading gaps stay empty.
    ForwardFill,
    /// Remove entries with a gap in any tracked metric.
    Drop,
}

impl CleaningMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CleaningMethod::Linear => "linear",
            CleaningMethod::ForwardFill => "forward_fill",
            CleaningMethod::Drop => "drop",
        }
    }
}

impl FromStr for CleaningMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "linear" => Ok(CleaningMethod::Linear),
            "forward_fill" | "ffill" => Ok(CleaningMethod::ForwardFill),
            "drop" => Ok(CleaningMethod::Drop),
            other => Err(format!(
                "unknown cleaning method '{other}' (expected linear, forward_fill or drop)"
            )),
        }
    }
}

/// Fill gaps in `series` with the chosen method.
pub fn clean(series: &[TimeSeriesEntry], method: CleaningMethod) -> Vec<TimeSeriesEntry> {
    match method {
        CleaningMethod::Linear => {
            let mut out = series.to_vec();
            for metric in Metric::ALL {
                fill_linear(&mut out, metric);
            }
            out
        }
        CleaningMethod::ForwardFill => {
            let mut out = series.to_vec();
            for metric in Metric::ALL {
                fill_forward(&mut out, metric);
            }
            out
        }
        CleaningMethod::Drop => drop_incomplete(series),
    }
}

fn fill_linear(entries: &mut [TimeSeriesEntry], metric: Metric) {
    let known: Vec<(usize, f64)> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.get(metric).map(|v| (i, v)))
        .collect();

    if known.is_empty() || known.len() == entries.len() {
        return;
    }

    // `next` is the first known position strictly after `i`.
    let mut next = 0;
    for i in 0..entries.len() {
        while next < known.len() && known[next].0 <= i {
            next += 1;
        }
        if entries[i].get(metric).is_some() {
            continue;
        }

        let prev = next.checked_sub(1).map(|k| known[k]);
        let after = known.get(next).copied();

        let value = match (prev, after) {
            (Some((pi, pv)), Some((ni, nv))) => {
                pv + (nv - pv) * (i - pi) as f64 / (ni - pi) as f64
            }
            (Some((_, pv)), None) => pv,
            (None, Some((_, nv))) => nv,
            (None, None) => continue,
        };
        entries[i].set(metric, Some(value));
    }
}

fn fill_forward(entries: &mut [TimeSeriesEntry], metric: Metric) {
    let mut last: Option<f64> = None;
    for entry in entries.iter_mut() {
        match entry.get(metric) {
            Some(v) => last = Some(v),
            None => {
                if last.is_some() {
                    entry.set(metric, last);
                }
            }
        }
    }
}

/// Tracked metrics are those with at least one value in the series, so a
/// metric the source never reports does not empty the whole series.
fn drop_incomplete(series: &[TimeSeriesEntry]) -> Vec<TimeSeriesEntry> {
    let tracked: Vec<Metric> = Metric::ALL
        .into_iter()
        .filter(|m| series.iter().any(|e| e.get(*m).is_some()))
        .collect();

    series
        .iter()
        .filter(|e| tracked.iter().all(|m| e.get(*m).is_some()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm25_series(values: &[Option<f64>]) -> Vec<TimeSeriesEntry> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut e = TimeSeriesEntry::new(format!("t{i}"), i * 10);
                e.set(Metric::Pm25, *v);
                e
            })
            .collect()
    }

    #[test]
    fn test_linear_midpoint() {
        let series = pm25_series(&[Some(10.0), None, Some(30.0)]);
        let cleaned = clean(&series, CleaningMethod::Linear);
        assert_eq!(cleaned[1].pm25, Some(20.0));
        // Input untouched
        assert_eq!(series[1].pm25, None);
    }

    #[test]
    fn test_linear_uneven_gap() {
        let series = pm25_series(&[Some(0.0), None, None, Some(30.0)]);
        let cleaned = clean(&series, CleaningMethod::Linear);
        assert_eq!(cleaned[1].pm25, Some(10.0));
        assert_eq!(cleaned[2].pm25, Some(20.0));
    }

    #[test]
    fn test_linear_holds_edges() {
        let series = pm25_series(&[None, Some(8.0), None, Some(12.0), None]);
        let cleaned = clean(&series, CleaningMethod::Linear);
        assert_eq!(cleaned[0].pm25, Some(8.0));
        assert_eq!(cleaned[2].pm25, Some(10.0));
        assert_eq!(cleaned[4].pm25, Some(12.0));
    }

    #[test]
    fn test_linear_all_null_stays_null() {
        let series = pm25_series(&[None, None]);
        let cleaned = clean(&series, CleaningMethod::Linear);
        assert!(cleaned.iter().all(|e| e.pm25.is_none()));
    }

    #[test]
    fn test_forward_fill() {
        let series = pm25_series(&[None, Some(5.0), None]);
        let cleaned = clean(&series, CleaningMethod::ForwardFill);
        assert_eq!(cleaned[0].pm25, None);
        assert_eq!(cleaned[1].pm25, Some(5.0));
        assert_eq!(cleaned[2].pm25, Some(5.0));
    }

    #[test]
    fn test_timestamp_and_index_preserved() {
        let series = pm25_series(&[Some(1.0), None, Some(3.0)]);
        for method in [CleaningMethod::Linear, CleaningMethod::ForwardFill] {
            let cleaned = clean(&series, method);
            for (a, b) in series.iter().zip(&cleaned) {
                assert_eq!(a.timestamp, b.timestamp);
                assert_eq!(a.index, b.index);
            }
        }
    }

    #[test]
    fn test_drop_removes_gaps_in_tracked_metrics_only() {
        let mut series = pm25_series(&[Some(1.0), None, Some(3.0)]);
        series[0].set(Metric::Noise, Some(40.0));
        series[2].set(Metric::Noise, Some(42.0));
        // Metric::Co2 is never reported and must not empty the series.
        let cleaned = clean(&series, CleaningMethod::Drop);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].index, 0);
        assert_eq!(cleaned[1].index, 20);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("forward-fill".parse::<CleaningMethod>(), Ok(CleaningMethod::ForwardFill));
        assert_eq!("LINEAR".parse::<CleaningMethod>(), Ok(CleaningMethod::Linear));
        assert!("spline".parse::<CleaningMethod>().is_err());
    }
}
