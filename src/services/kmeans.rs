//! One-dimensional k-means
//!
//! Lloyd's algorithm with k-means++ seeding over scalar features. The
//! category clusterer only ever clusters a single scalar per category, so
//! centroids are plain `f64`s.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{EngineError, EngineResult};

/// Configuration for a k-means fit
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    /// Maximum Lloyd iterations
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this
    pub tolerance: f64,
    /// Random seed for reproducible initialization
    pub seed: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-9,
            seed: None,
        }
    }
}

impl KMeansConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Fitted k-means model
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centroids: Vec<f64>,
    iterations: usize,
    inertia: f64,
}

impl KMeans {
    /// Fits `k` centroids to `values`
    pub fn fit(values: &[f64], k: usize, config: &KMeansConfig) -> EngineResult<Self> {
        if values.is_empty() {
            return Err(EngineError::InsufficientData(
                "cannot cluster an empty sample".to_string(),
            ));
        }
        if k == 0 || k > values.len() {
            return Err(EngineError::DegenerateInput(format!(
                "k ({}) must be between 1 and the sample size ({})",
                k,
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::DegenerateInput(
                "sample contains non-finite values".to_string(),
            ));
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut centroids = kmeans_plus_plus_init(values, k, &mut rng);
        let mut iterations = 0;

        for iter in 0..config.max_iterations {
            iterations = iter + 1;

            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for &v in values {
                let c = nearest(&centroids, v);
                sums[c] += v;
                counts[c] += 1;
            }

            // Empty clusters keep their previous centroid
            let mut shift: f64 = 0.0;
            for (c, centroid) in centroids.iter_mut().enumerate() {
                if counts[c] > 0 {
                    let updated = sums[c] / counts[c] as f64;
                    shift = shift.max((updated - *centroid).abs());
                    *centroid = updated;
                }
            }

            if shift <= config.tolerance {
                break;
            }
        }

        let inertia = values
            .iter()
            .map(|&v| (v - centroids[nearest(&centroids, v)]).powi(2))
            .sum();

        Ok(Self {
            centroids,
            iterations,
            inertia,
        })
    }

    /// Label of the centroid closest to `value`
    pub fn predict_one(&self, value: f64) -> usize {
        nearest(&self.centroids, value)
    }

    #[cfg(test)]
    pub fn centroids(&self) -> &[f64] {
        &self.centroids
    }

    #[cfg(test)]
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the closest existing one
fn kmeans_plus_plus_init(values: &[f64], k: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(values[rng.gen_range(0..values.len())]);

    while centroids.len() < k {
        let distances: Vec<f64> = values
            .iter()
            .map(|&v| (v - centroids[nearest(&centroids, v)]).powi(2))
            .collect();

        let total: f64 = distances.iter().sum();
        if total <= 0.0 {
            centroids.push(values[rng.gen_range(0..values.len())]);
            continue;
        }

        let threshold = rng.gen::<f64>() * total;
        let mut cumsum = 0.0;
        let mut selected = values.len() - 1;
        for (i, &d) in distances.iter().enumerate() {
            cumsum += d;
            if cumsum >= threshold && d > 0.0 {
                selected = i;
                break;
            }
        }

        centroids.push(values[selected]);
    }

    centroids
}

/// Index of the closest centroid, lowest index on ties
fn nearest(centroids: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &c) in centroids.iter().enumerate() {
        let d = (value - c).abs();
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}
