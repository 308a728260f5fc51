use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    dataset::Dataset,
    error::{EngineError, EngineResult},
    models::{CheckIn, Coordinates, Participant, MEETING_PARTY_SIZE},
    services::frequency::frequent_categories,
};

/// Where a group should meet, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingPoint {
    pub location: Coordinates,
    /// Planar mean of the participants' locations
    pub midpoint: Coordinates,
    pub venue_id: String,
    pub category_name: String,
    /// Category shared by at least two participants, if any
    pub shared_category: Option<String>,
}

/// Picks the check-in location closest to the group's midpoint
///
/// When at least two participants share an above-average category, only
/// check-ins of the most shared one are considered (ties go to the
/// alphabetically first category). Otherwise every check-in is.
pub fn resolve_meeting_point(
    dataset: &Dataset,
    participants: &[Participant; MEETING_PARTY_SIZE],
) -> EngineResult<MeetingPoint> {
    let locations: Vec<Coordinates> = participants.iter().map(Participant::location).collect();
    let midpoint = Coordinates::mean(&locations).ok_or_else(|| {
        EngineError::InsufficientData("no participant locations".to_string())
    })?;

    let mut votes: BTreeMap<String, usize> = BTreeMap::new();
    for participant in participants {
        for category in frequent_categories(dataset, participant.user_id) {
            *votes.entry(category.category_name).or_insert(0) += 1;
        }
    }

    let mut winner: Option<(&str, usize)> = None;
    for (name, &count) in &votes {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((name.as_str(), count));
        }
    }

    let shared_category = winner
        .filter(|&(_, count)| count > 1)
        .map(|(name, _)| name.to_string());

    let nearest = match &shared_category {
        Some(name) => nearest_to(dataset.rows_by_category_name(name), &midpoint),
        None => nearest_to(dataset.rows().iter(), &midpoint),
    }
    .ok_or_else(|| EngineError::InsufficientData("no candidate locations".to_string()))?;

    tracing::info!(
        midpoint_lat = midpoint.latitude,
        midpoint_lon = midpoint.longitude,
        shared_category = shared_category.as_deref().unwrap_or("-"),
        votes = winner.map_or(0, |(_, count)| count),
        venue_id = %nearest.venue_id,
        "Resolved meeting point"
    );

    Ok(MeetingPoint {
        location: nearest.coordinates(),
        midpoint,
        venue_id: nearest.venue_id.clone(),
        category_name: nearest.category_name.clone(),
        shared_category,
    })
}

/// Row with the smallest planar squared distance to `target`, first one on ties
fn nearest_to<'a>(
    rows: impl Iterator<Item = &'a CheckIn>,
    target: &Coordinates,
) -> Option<&'a CheckIn> {
    let mut best: Option<(&CheckIn, f64)> = None;
    for row in rows {
        let d = row.coordinates().squared_distance(target);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((row, d));
        }
    }
    best.map(|(row, _)| row)
}
