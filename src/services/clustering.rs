use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};

use crate::{
    dataset::Dataset,
    error::{EngineError, EngineResult},
    models::CategoryProfile,
    services::kmeans::{KMeans, KMeansConfig},
};

/// Every category's activity sum together with its cluster label
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryClusters {
    profiles: BTreeMap<String, CategoryProfile>,
    k: usize,
}

impl CategoryClusters {
    /// Wraps already-labelled profiles
    pub fn from_profiles(profiles: Vec<CategoryProfile>, k: usize) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
            k,
        }
    }

    pub fn get(&self, category_name: &str) -> Option<&CategoryProfile> {
        self.profiles.get(category_name)
    }

    /// Profiles in lexicographic category order
    #[cfg(test)]
    pub fn profiles(&self) -> impl Iterator<Item = &CategoryProfile> {
        self.profiles.values()
    }

    /// Profiles carrying `label`, in lexicographic category order
    pub fn members(&self, label: usize) -> impl Iterator<Item = &CategoryProfile> {
        self.profiles.values().filter(move |p| p.cluster == label)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Number of clusters requested from the partitioner
    pub fn k(&self) -> usize {
        self.k
    }
}

/// `ceil(sqrt(n / 2))`, with a single cluster for zero or one category
pub fn cluster_count(category_count: usize) -> usize {
    if category_count <= 1 {
        return 1;
    }
    ((category_count as f64 / 2.0).sqrt().ceil() as usize).max(1)
}

/// Groups categories by how intensely users visit them
///
/// Each user's visits are turned into percentages of that user's total, then
/// summed per category into the activity sum. A k-means model is fitted on a
/// random share of the categories and used to label all of them.
pub fn cluster_categories(
    dataset: &Dataset,
    seed: u64,
    sample_fraction: f64,
) -> EngineResult<CategoryClusters> {
    let counts = dataset.category_user_counts();
    if counts.is_empty() {
        return Err(EngineError::InsufficientData(
            "no categories to cluster".to_string(),
        ));
    }

    let mut user_totals: HashMap<u32, usize> = HashMap::new();
    for per_user in counts.values() {
        for (&user_id, &n) in per_user {
            *user_totals.entry(user_id).or_insert(0) += n;
        }
    }

    let mut profiles: BTreeMap<String, CategoryProfile> = BTreeMap::new();
    for (name, per_user) in counts {
        let mut user_shares = BTreeMap::new();
        for (user_id, n) in per_user {
            let total = user_totals.get(&user_id).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            user_shares.insert(user_id, n as f64 / total as f64 * 100.0);
        }
        let activity_sum = user_shares.values().sum();
        profiles.insert(
            name.clone(),
            CategoryProfile {
                name,
                user_shares,
                activity_sum,
                cluster: 0,
            },
        );
    }

    let n = profiles.len();
    let k = cluster_count(n);

    if k == 1 {
        tracing::warn!(categories = n, "Too few categories to partition, using one cluster");
        return Ok(CategoryClusters { profiles, k });
    }

    let sums: Vec<f64> = profiles.values().map(|p| p.activity_sum).collect();
    let sample_size = ((n as f64 * sample_fraction).round() as usize).clamp(k, n);

    let mut rng = StdRng::seed_from_u64(seed);
    let sample: Vec<f64> = rand::seq::index::sample(&mut rng, n, sample_size)
        .into_iter()
        .map(|i| sums[i])
        .collect();

    let model = KMeans::fit(&sample, k, &KMeansConfig::default().with_seed(seed))?;

    for profile in profiles.values_mut() {
        profile.cluster = model.predict_one(profile.activity_sum);
    }

    tracing::info!(
        categories = n,
        clusters = k,
        sample_size,
        iterations = model.iterations(),
        inertia = model.inertia(),
        "Clustered categories by activity sum"
    );

    Ok(CategoryClusters { profiles, k })
}
