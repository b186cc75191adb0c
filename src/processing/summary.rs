//! Per-metric summary statistics over a time series.

use crate::types::{Metric, MetricSummary, SensorSummary, TimeSeriesEntry};

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Accumulator {
    const EMPTY: Self = Self {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        sum: 0.0,
        count: 0,
    };

    fn push(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }
}

/// Reduce a series to `{min, max, avg, count, unit}` per metric.
///
/// Single pass over the entries. Metrics without any finite value are
/// omitted rather than zero-filled.
pub fn summarize(series: &[TimeSeriesEntry]) -> SensorSummary {
    let mut acc = [Accumulator::EMPTY; Metric::ALL.len()];

    for entry in series {
        for (slot, metric) in acc.iter_mut().zip(Metric::ALL) {
            if let Some(value) = entry.get(metric).filter(|v| v.is_finite()) {
                slot.push(value);
            }
        }
    }

    Metric::ALL
        .into_iter()
        .zip(acc)
        .filter(|(_, a)| a.count > 0)
        .map(|(metric, a)| {
            (
                metric,
                MetricSummary {
                    min: a.min,
                    max: a.max,
                    avg: a.sum / a.count as f64,
                    count: a.count,
                    unit: metric.unit().to_string(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize, pm25: Option<f64>) -> TimeSeriesEntry {
        let mut e = TimeSeriesEntry::new(format!("t{i}"), i);
        e.set(Metric::Pm25, pm25);
        e
    }

    #[test]
    fn test_basic_stats() {
        let series = vec![entry(0, Some(10.0)), entry(1, Some(20.0)), entry(2, Some(30.0))];
        let summary = summarize(&series);
        let pm25 = &summary[&Metric::Pm25];
        assert_eq!(pm25.min, 10.0);
        assert_eq!(pm25.max, 30.0);
        assert_eq!(pm25.avg, 20.0);
        assert_eq!(pm25.count, 3);
        assert_eq!(pm25.unit, "µg/m³");
    }

    #[test]
    fn test_all_null_metric_omitted() {
        let series = vec![
            entry(0, Some(5.0)).with(Metric::Noise, 40.0),
            entry(1, None),
        ];
        let summary = summarize(&series);
        assert!(summary.contains_key(&Metric::Pm25));
        assert!(summary.contains_key(&Metric::Noise));
        assert!(!summary.contains_key(&Metric::Pm10));
        assert!(!summary.contains_key(&Metric::Co2));
        assert_eq!(summary[&Metric::Pm25].count, 1);
    }

    #[test]
    fn test_empty_series() {
        assert!(summarize(&[]).is_empty());
    }
}
