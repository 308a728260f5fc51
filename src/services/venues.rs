use std::collections::HashSet;

use crate::{
    dataset::Dataset,
    error::{EngineError, EngineResult},
    models::{Coordinates, VenueRecommendation},
    services::{
        clustering::CategoryClusters,
        frequency::frequent_categories,
        geofence::{LocationFence, LocationMetric},
        similarity::similar_categories,
    },
};

/// Suggests venues the user has not been to, in categories like `category_name`
///
/// Pipeline:
/// 1. rank the categories of `category_name`'s cluster by activity-sum distance
/// 2. take the user's above-average categories and every distinct location
///    where anyone checked into them
/// 3. fence those locations and keep check-ins inside the fence made by other
///    users at venues the user never visited
/// 4. walk the ranked categories in order, taking each venue once, up to `limit`
///
/// Running out of data at any step yields an empty list. Only an unknown
/// category is an error.
pub fn recommend_venues(
    dataset: &Dataset,
    clusters: &CategoryClusters,
    user_id: u32,
    category_name: &str,
    metric: LocationMetric,
    limit: usize,
) -> EngineResult<Vec<VenueRecommendation>> {
    let ranked = similar_categories(category_name, clusters)?;
    if ranked.is_empty() {
        tracing::info!(
            user_id,
            category = %category_name,
            "No categories tighter than the cluster average"
        );
        return Ok(Vec::new());
    }

    let frequent = frequent_categories(dataset, user_id);
    let frequent_ids: Vec<&str> = frequent.iter().map(|c| c.category_id.as_str()).collect();
    let area = usual_area(dataset, &frequent_ids);

    let fence = match LocationFence::build(&area, metric) {
        Ok(fence) => fence,
        Err(e @ (EngineError::InsufficientData(_) | EngineError::DegenerateInput(_))) => {
            tracing::warn!(
                user_id,
                frequent_categories = frequent.len(),
                error = %e,
                "Cannot fence the user's usual area"
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let visited = dataset.venues_visited_by(user_id);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut recommendations = Vec::new();

    'categories: for category in &ranked {
        for row in dataset.rows_by_category_name(&category.name) {
            if row.user_id == user_id
                || visited.contains(row.venue_id.as_str())
                || !fence.contains(&row.coordinates())
            {
                continue;
            }
            if seen.insert(row.venue_id.as_str()) {
                recommendations.push(VenueRecommendation::from(row));
                if recommendations.len() >= limit {
                    break 'categories;
                }
            }
        }
    }

    tracing::info!(
        user_id,
        category = %category_name,
        clusters = clusters.k(),
        similar_categories = ranked.len(),
        area_points = area.len(),
        fence_low = fence.bounds().low,
        fence_high = fence.bounds().high,
        recommended = recommendations.len(),
        "Venue recommendation completed"
    );

    Ok(recommendations)
}

/// Distinct locations of every check-in in the given categories, first seen first
fn usual_area(dataset: &Dataset, category_ids: &[&str]) -> Vec<Coordinates> {
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    category_ids
        .iter()
        .flat_map(|id| dataset.rows_by_category_id(id))
        .map(|row| row.coordinates())
        .filter(|p| seen.insert((p.latitude.to_bits(), p.longitude.to_bits())))
        .collect()
}
