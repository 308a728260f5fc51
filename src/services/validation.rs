use crate::{
    dataset::Dataset,
    error::{EngineError, EngineResult},
    models::{Coordinates, Participant, MEETING_PARTY_SIZE},
};

/// Whether `id` lies inside the dataset's user-id range
pub fn is_valid_user_id(dataset: &Dataset, id: i64) -> bool {
    dataset
        .user_id_range()
        .is_some_and(|(min, max)| id >= i64::from(min) && id <= i64::from(max))
}

/// Range-checked user id
pub fn check_user_id(dataset: &Dataset, id: i64) -> EngineResult<u32> {
    if !is_valid_user_id(dataset, id) {
        let message = match dataset.user_id_range() {
            Some((min, max)) => format!("{} is outside {}..={}", id, min, max),
            None => "the dataset has no users".to_string(),
        };
        return Err(EngineError::validation("user_id", message));
    }
    u32::try_from(id).map_err(|_| EngineError::validation("user_id", format!("{} is not a user id", id)))
}

/// The known category name containing `input`, if any
///
/// Matching is case-sensitive on the trimmed input. Names are tried from the
/// most checked-into to the least, so broad input resolves to a popular
/// category. Blank input never matches.
pub fn match_category_name(dataset: &Dataset, input: &str) -> Option<String> {
    let needle = input.trim();
    if needle.is_empty() {
        return None;
    }
    dataset
        .category_names_by_popularity()
        .into_iter()
        .find(|name| name.contains(needle))
        .map(str::to_string)
}

pub fn check_category_name(dataset: &Dataset, input: &str) -> EngineResult<String> {
    match_category_name(dataset, input).ok_or_else(|| {
        EngineError::validation("category", format!("no category matches '{}'", input.trim()))
    })
}

/// Latitude within [-90, 90] and longitude within [-180, 180]
pub fn check_location(latitude: f64, longitude: f64) -> EngineResult<Coordinates> {
    if !(latitude.is_finite() && latitude.abs() <= 90.0) {
        return Err(EngineError::validation(
            "latitude",
            format!("{} is outside -90..=90", latitude),
        ));
    }
    if !(longitude.is_finite() && longitude.abs() <= 180.0) {
        return Err(EngineError::validation(
            "longitude",
            format!("{} is outside -180..=180", longitude),
        ));
    }
    Ok(Coordinates::new(latitude, longitude))
}

/// Exactly five participants, each with a known user id and a valid location
pub fn check_participants(
    dataset: &Dataset,
    participants: &[Participant],
) -> EngineResult<[Participant; MEETING_PARTY_SIZE]> {
    let party: [Participant; MEETING_PARTY_SIZE] = participants.try_into().map_err(|_| {
        EngineError::validation(
            "participants",
            format!(
                "expected {} participants, got {}",
                MEETING_PARTY_SIZE,
                participants.len()
            ),
        )
    })?;

    for participant in &party {
        check_user_id(dataset, i64::from(participant.user_id))?;
        check_location(participant.latitude, participant.longitude)?;
    }

    Ok(party)
}
