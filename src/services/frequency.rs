use crate::{dataset::Dataset, models::FrequentCategory};

/// Categories the user visits more often than their own average
///
/// Counts are taken per category id, and only counts strictly above the
/// user's mean count survive. Sorted by visits (descending), then name. A user
/// without check-ins, or with equal counts everywhere, gets an empty list.
pub fn frequent_categories(dataset: &Dataset, user_id: u32) -> Vec<FrequentCategory> {
    let counts = dataset.category_id_counts_for_user(user_id);
    if counts.is_empty() {
        return Vec::new();
    }

    let mean = counts.values().sum::<usize>() as f64 / counts.len() as f64;

    let mut frequent: Vec<FrequentCategory> = counts
        .into_iter()
        .filter(|&(_, visits)| visits as f64 > mean)
        .map(|(category_id, visits)| FrequentCategory {
            category_name: dataset
                .category_name(&category_id)
                .unwrap_or(&category_id)
                .to_string(),
            category_id,
            visits,
        })
        .collect();

    frequent.sort_by(|a, b| {
        b.visits
            .cmp(&a.visits)
            .then_with(|| a.category_name.cmp(&b.category_name))
    });

    frequent
}
