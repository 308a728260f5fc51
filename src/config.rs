use serde::Deserialize;

use crate::services::{geofence::LocationMetric, EngineSettings};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Tab-separated check-in file loaded once at startup
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seed for category sampling and centroid initialization
    #[serde(default = "default_cluster_seed")]
    pub cluster_seed: u64,

    /// Share of categories the clustering model is fitted on
    #[serde(default = "default_cluster_sample_fraction")]
    pub cluster_sample_fraction: f64,

    /// Scalar used by the geofence: `centroid_distance` or `ratio`
    #[serde(default)]
    pub location_metric: LocationMetric,

    /// Keep clustering and the user/category matrix for the process lifetime
    #[serde(default = "default_cache_derived")]
    pub cache_derived: bool,
}

fn default_dataset_path() -> String {
    "data/dataset_NYC.txt".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cluster_seed() -> u64 {
    42
}

fn default_cluster_sample_fraction() -> f64 {
    0.1
}

fn default_cache_derived() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        if !(config.cluster_sample_fraction > 0.0 && config.cluster_sample_fraction <= 1.0) {
            anyhow::bail!(
                "CLUSTER_SAMPLE_FRACTION must be in (0, 1], got {}",
                config.cluster_sample_fraction
            );
        }

        Ok(config)
    }

    /// Engine-relevant subset of the configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            cluster_seed: self.cluster_seed,
            sample_fraction: self.cluster_sample_fraction,
            location_metric: self.location_metric,
            cache_derived: self.cache_derived,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let vars: Vec<(String, String)> = Vec::new();
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.dataset_path, "data/dataset_NYC.txt");
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.cluster_seed, 42);
        assert_eq!(config.location_metric, LocationMetric::CentroidDistance);
        assert!(config.cache_derived);
    }

    #[test]
    fn test_overrides() {
        let vars = vec![
            ("PORT".to_string(), "8080".to_string()),
            ("LOCATION_METRIC".to_string(), "ratio".to_string()),
            ("CACHE_DERIVED".to_string(), "false".to_string()),
            ("CLUSTER_SEED".to_string(), "7".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        let settings = config.engine_settings();

        assert_eq!(config.port, 8080);
        assert_eq!(settings.location_metric, LocationMetric::Ratio);
        assert_eq!(settings.cluster_seed, 7);
        assert!(!settings.cache_derived);
    }
}
