use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::{EngineError, EngineResult},
    services::clustering::CategoryClusters,
};

/// A category from the query category's cluster, with its distance to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCategory {
    pub name: String,
    pub activity_sum: f64,
    /// Absolute activity-sum difference from the query category
    pub diff: f64,
}

/// A user ranked by cosine similarity to the query user
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarUser {
    pub user_id: u32,
    pub similarity: f64,
}

/// Ranks the categories sharing `category_name`'s cluster by activity-sum distance
///
/// Closest first, ties by name. Only categories closer than the cluster's mean
/// distance are kept; when every distance is equal nothing is.
pub fn similar_categories(
    category_name: &str,
    clusters: &CategoryClusters,
) -> EngineResult<Vec<SimilarCategory>> {
    let query = clusters.get(category_name).ok_or_else(|| {
        EngineError::validation("category", format!("unknown category '{}'", category_name))
    })?;

    let mut ranked: Vec<SimilarCategory> = clusters
        .members(query.cluster)
        .map(|p| SimilarCategory {
            name: p.name.clone(),
            activity_sum: p.activity_sum,
            diff: (p.activity_sum - query.activity_sum).abs(),
        })
        .collect();

    // members() yields names in order, so a stable sort keeps ties by name
    ranked.sort_by(|a, b| a.diff.total_cmp(&b.diff));

    let mean = ranked.iter().map(|c| c.diff).sum::<f64>() / ranked.len() as f64;
    ranked.retain(|c| c.diff < mean);

    tracing::debug!(
        category = %category_name,
        cluster = query.cluster,
        kept = ranked.len(),
        "Ranked similar categories"
    );

    Ok(ranked)
}

/// Dense user x category visit-count matrix with precomputed row norms
#[derive(Debug, Clone)]
pub struct UserCategoryMatrix {
    user_ids: Vec<u32>,
    rows: Vec<Vec<f64>>,
    norms: Vec<f64>,
}

impl UserCategoryMatrix {
    pub fn build(dataset: &Dataset) -> EngineResult<Self> {
        if dataset.is_empty() {
            return Err(EngineError::InsufficientData(
                "no check-ins to compare users by".to_string(),
            ));
        }

        let categories: Vec<String> = dataset.category_names().map(str::to_string).collect();
        let profiles = dataset.user_profiles();

        let user_ids = profiles.iter().map(|p| p.user_id).collect();
        let rows: Vec<Vec<f64>> = profiles.iter().map(|p| p.vector(&categories)).collect();
        let norms = rows
            .iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
            .collect();

        Ok(Self {
            user_ids,
            rows,
            norms,
        })
    }

    /// Users in row order (ascending id)
    pub fn user_ids(&self) -> &[u32] {
        &self.user_ids
    }

    pub fn row_index(&self, user_id: u32) -> Option<usize> {
        self.user_ids.binary_search(&user_id).ok()
    }

    /// Cosine similarity between two rows; zero when either row is all zeros
    pub fn cosine(&self, a: usize, b: usize) -> f64 {
        let denominator = self.norms[a] * self.norms[b];
        if denominator == 0.0 {
            return 0.0;
        }
        let dot: f64 = self.rows[a]
            .iter()
            .zip(&self.rows[b])
            .map(|(x, y)| x * y)
            .sum();
        (dot / denominator).clamp(-1.0, 1.0)
    }
}

/// The `limit` users most similar to `user_id`, excluding the user themself
///
/// Sorted by descending similarity; equal similarities keep row order.
pub fn similar_users(
    matrix: &UserCategoryMatrix,
    user_id: u32,
    limit: usize,
) -> EngineResult<Vec<SimilarUser>> {
    let query = matrix.row_index(user_id).ok_or_else(|| {
        EngineError::InsufficientData(format!("user {} has no check-ins", user_id))
    })?;

    let mut ranked: Vec<SimilarUser> = matrix
        .user_ids()
        .iter()
        .enumerate()
        .filter(|&(idx, _)| idx != query)
        .map(|(idx, &other)| SimilarUser {
            user_id: other,
            similarity: matrix.cosine(query, idx),
        })
        .collect();

    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked.truncate(limit);

    Ok(ranked)
}
