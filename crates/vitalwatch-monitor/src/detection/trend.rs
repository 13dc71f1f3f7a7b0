//! Trend summaries over a window of readings.

use serde::{Deserialize, Serialize};

use crate::domain::VitalReading;

/// Summary statistics and linear trend for a series of readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Number of readings
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Least-squares slope in units per hour
    pub slope_per_hour: f64,
}

/// Computes [`TrendSummary`] values
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// Summarise a series, or `None` if it has no finite values
    pub fn analyze(readings: &[VitalReading]) -> Option<TrendSummary> {
        let samples: Vec<&VitalReading> = readings.iter().filter(|r| r.value().is_finite()).collect();
        let first = samples.iter().map(|r| *r.timestamp()).min()?;

        let points: Vec<(f64, f64)> = samples
            .iter()
            .map(|r| {
                let hours = (*r.timestamp() - first).num_milliseconds() as f64 / 3_600_000.0;
                (hours, r.value())
            })
            .collect();

        let n = points.len() as f64;
        let mean = points.iter().map(|(_, v)| v).sum::<f64>() / n;
        let min = points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let max = points.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);

        Some(TrendSummary {
            count: points.len(),
            mean,
            min,
            max,
            slope_per_hour: least_squares_slope(&points),
        })
    }
}

fn least_squares_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        let dx = x - mean_x;
        (num + dx * (y - mean_y), den + dx * dx)
    });

    if den.abs() < f64::EPSILON {
        0.0
    } else {
        num / den
    }
}
