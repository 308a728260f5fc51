use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate visitation pattern of one venue category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub name: String,
    /// Percentage of each user's visits that went to this category
    pub user_shares: BTreeMap<u32, f64>,
    /// Sum of `user_shares` across users
    pub activity_sum: f64,
    /// Cluster label; only equality between labels is meaningful
    pub cluster: usize,
}

/// Category visit counts of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: u32,
    pub category_counts: BTreeMap<String, usize>,
}

impl UserProfile {
    pub fn total_visits(&self) -> usize {
        self.category_counts.values().sum()
    }

    /// Visit counts laid out along `categories`, zero where unvisited
    pub fn vector(&self, categories: &[String]) -> Vec<f64> {
        categories
            .iter()
            .map(|c| self.category_counts.get(c).copied().unwrap_or(0) as f64)
            .collect()
    }
}

/// A category a user visits more often than their own average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentCategory {
    pub category_id: String,
    pub category_name: String,
    pub visits: usize,
}
