//! Interquartile-range geofence
//!
//! Points are reduced to one scalar each and Tukey's fences over those
//! scalars decide which candidate locations count as "in the usual area".
//! Two reductions are available: the plain latitude/longitude ratio, and the
//! haversine distance to the centroid of the reference points (the default,
//! which has no singularity and measures actual geography).

use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, EngineResult},
    models::Coordinates,
};

/// Multiplier applied to the interquartile range
const IQR_MULTIPLIER: f64 = 1.5;

/// How a location is reduced to the scalar the fence is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMetric {
    /// Kilometres from the centroid of the reference points
    #[default]
    CentroidDistance,
    /// `latitude / longitude`; points on the prime meridian are skipped
    Ratio,
}

/// Tukey's fences over a sample of scalars
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geofence {
    pub low: f64,
    pub high: f64,
}

impl Geofence {
    /// `low = Q1 - 1.5 IQR`, `high = Q3 + 1.5 IQR`
    pub fn from_scalars(values: &[f64]) -> EngineResult<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Err(EngineError::InsufficientData(
                "no values to compute a geofence from".to_string(),
            ));
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;

        Ok(Self {
            low: q1 - IQR_MULTIPLIER * iqr,
            high: q3 + IQR_MULTIPLIER * iqr,
        })
    }

    /// Strictly inside the fence
    pub fn contains(&self, value: f64) -> bool {
        self.low < value && value < self.high
    }
}

/// Quantile of sorted data with linear interpolation between order statistics
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// A geofence bound to the locations it was computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFence {
    metric: LocationMetric,
    reference: Option<Coordinates>,
    fence: Geofence,
}

impl LocationFence {
    /// Computes the fence over the scalars of `points`
    pub fn build(points: &[Coordinates], metric: LocationMetric) -> EngineResult<Self> {
        if points.is_empty() {
            return Err(EngineError::InsufficientData(
                "no reference locations for the geofence".to_string(),
            ));
        }

        let reference = match metric {
            LocationMetric::CentroidDistance => Coordinates::mean(points),
            LocationMetric::Ratio => None,
        };

        let mut fence = Self {
            metric,
            reference,
            fence: Geofence {
                low: f64::NAN,
                high: f64::NAN,
            },
        };

        let scalars: Vec<f64> = points.iter().filter_map(|p| fence.scalar(p)).collect();
        if scalars.is_empty() {
            return Err(EngineError::DegenerateInput(
                "every reference location lies on longitude 0".to_string(),
            ));
        }
        fence.fence = Geofence::from_scalars(&scalars)?;

        tracing::debug!(
            metric = ?metric,
            points = points.len(),
            low = fence.fence.low,
            high = fence.fence.high,
            "Computed geofence"
        );

        Ok(fence)
    }

    /// The scalar a location is judged by; `None` where the metric is undefined
    pub fn scalar(&self, point: &Coordinates) -> Option<f64> {
        match (self.metric, self.reference) {
            (LocationMetric::Ratio, _) => point.ratio(),
            (LocationMetric::CentroidDistance, Some(reference)) => {
                Some(reference.haversine_km(point))
            }
            (LocationMetric::CentroidDistance, None) => None,
        }
    }

    /// Ratios must fall strictly inside both fences; distances only need to
    /// stay below the upper one, being close to the centroid is never an outlier
    pub fn contains(&self, point: &Coordinates) -> bool {
        self.scalar(point).is_some_and(|value| match self.metric {
            LocationMetric::Ratio => self.fence.contains(value),
            LocationMetric::CentroidDistance => value < self.fence.high,
        })
    }

    pub fn bounds(&self) -> Geofence {
        self.fence
    }
}
