use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use poi_recommender::{
    dataset::Dataset,
    error::EngineError,
    models::Participant,
    services::{
        geofence::{quantile, Geofence, LocationMetric},
        similarity::{similar_users, UserCategoryMatrix},
        EngineSettings, Recommender, RECOMMENDATION_LIMIT, SIMILAR_USER_LIMIT,
    },
};

const CATEGORIES: [&str; 10] = [
    "Bar",
    "Coffee Shop",
    "Deli / Bodega",
    "Gym / Fitness Center",
    "Home (private)",
    "Museum",
    "Park",
    "Pizza Place",
    "Subway",
    "Train Station",
];

fn row(user: u32, venue: &str, category: &str, lat: f64, lon: f64) -> String {
    format!(
        "{user}\t{venue}\tid-{category}\t{category}\t{lat}\t{lon}\t-240\tTue Apr 03 18:00:09 +0000 2012\n"
    )
}

fn recommender_from(tsv: &str) -> Recommender {
    let dataset = Dataset::from_reader(tsv.as_bytes()).unwrap();
    Recommender::new(Arc::new(dataset), EngineSettings::default())
}

/// 25 users around Manhattan, each with a favourite category and some noise
fn city_tsv() -> String {
    let mut rng = StdRng::seed_from_u64(7);
    let mut tsv = String::new();

    let venue = |category_idx: usize, venue_idx: usize| {
        let name = format!("{}-{}", CATEGORIES[category_idx], venue_idx);
        let lat = 40.70 + venue_idx as f64 * 0.01;
        let lon = -74.02 + category_idx as f64 * 0.005;
        (name, lat, lon)
    };

    for user in 1..=25u32 {
        let favourite = user as usize % CATEGORIES.len();
        for _ in 0..6 {
            let (name, lat, lon) = venue(favourite, rng.gen_range(0..15));
            tsv.push_str(&row(user, &name, CATEGORIES[favourite], lat, lon));
        }
        for _ in 0..6 {
            let category = rng.gen_range(0..CATEGORIES.len());
            let (name, lat, lon) = venue(category, rng.gen_range(0..15));
            tsv.push_str(&row(user, &name, CATEGORIES[category], lat, lon));
        }
    }

    tsv
}

fn party() -> Vec<Participant> {
    vec![
        Participant::new(1, 40.70, -74.00),
        Participant::new(2, 40.72, -74.00),
        Participant::new(3, 40.74, -74.00),
        Participant::new(4, 40.70, -74.02),
        Participant::new(5, 40.74, -74.02),
    ]
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(city_tsv().as_bytes()).unwrap();

    let dataset = Dataset::load(file.path()).unwrap();

    assert_eq!(dataset.len(), 25 * 12);
    assert_eq!(dataset.user_id_range(), Some((1, 25)));
}

#[test]
fn test_load_missing_file_fails() {
    let err = Dataset::load("/definitely/not/here.tsv").unwrap_err();
    assert!(matches!(err, EngineError::DataLoad(_)));
}

#[test]
fn test_venue_recommendations_are_unvisited_and_distinct() {
    let engine = recommender_from(&city_tsv());
    let mut any_recommended = false;

    for user in 1..=25u32 {
        let visited = engine.dataset().venues_visited_by(user);
        for category in CATEGORIES {
            let venues = engine.recommend_venues(i64::from(user), category).unwrap();

            assert!(venues.len() <= RECOMMENDATION_LIMIT);
            let distinct: HashSet<&str> = venues.iter().map(|v| v.venue_id.as_str()).collect();
            assert_eq!(distinct.len(), venues.len());
            for venue in &venues {
                assert!(
                    !visited.contains(venue.venue_id.as_str()),
                    "user {} already visited {}",
                    user,
                    venue.venue_id
                );
            }

            any_recommended |= !venues.is_empty();
        }
    }

    assert!(any_recommended);
}

#[test]
fn test_single_category_dataset_does_not_crash() {
    let tsv: String = [
        row(1, "b1", "Bar", 40.70, -74.00),
        row(1, "b2", "Bar", 40.71, -74.00),
        row(2, "b3", "Bar", 40.72, -74.01),
        row(3, "b4", "Bar", 40.73, -74.02),
        row(3, "b4", "Bar", 40.73, -74.02),
    ]
    .concat();
    let engine = recommender_from(&tsv);

    let venues = engine.recommend_venues(1, "Bar").unwrap();
    assert!(venues.is_empty());
}

#[test]
fn test_similar_users_are_top_ten_by_similarity() {
    let engine = recommender_from(&city_tsv());
    let matrix = UserCategoryMatrix::build(engine.dataset()).unwrap();

    for user in [1u32, 7, 25] {
        let ids = engine.recommend_similar_users(i64::from(user)).unwrap();

        assert_eq!(ids.len(), SIMILAR_USER_LIMIT);
        assert!(!ids.contains(&user));
        let distinct: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), ids.len());

        let ranked = similar_users(&matrix, user, SIMILAR_USER_LIMIT).unwrap();
        assert_eq!(ranked.iter().map(|u| u.user_id).collect::<Vec<_>>(), ids);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].similarity >= pair[1].similarity));
    }
}

#[test]
fn test_meeting_point_prefers_shared_category() {
    let others = ["Gym", "Pub", "Museum", "Park", "Library"];
    let mut tsv = String::new();
    for (i, other) in others.iter().enumerate() {
        let user = i as u32 + 1;
        let lat = 40.60 + i as f64 * 0.01;
        for _ in 0..3 {
            tsv.push_str(&row(user, &format!("cafe-{user}"), "Cafe", lat, -74.10));
        }
        tsv.push_str(&row(user, &format!("{other}-{user}"), other, 40.80, -73.90));
    }
    // a non-Cafe check-in right on the group's midpoint
    tsv.push_str(&row(6, "bakery", "Bakery", 40.72, -74.008));

    let engine = recommender_from(&tsv);
    let point = engine.recommend_meeting_point(&party()).unwrap();

    assert_eq!(point.shared_category.as_deref(), Some("Cafe"));
    assert_eq!(point.category_name, "Cafe");
    assert_ne!(point.venue_id, "bakery");
    // closest Cafe to (40.72, -74.008) is user 5's at latitude 40.64
    assert!((point.location.latitude - 40.64).abs() < 1e-9);
    assert!((point.location.longitude + 74.10).abs() < 1e-9);
}

#[test]
fn test_meeting_point_ignores_participant_order() {
    let engine = recommender_from(&city_tsv());
    let forward = party();
    let expected = engine.recommend_meeting_point(&forward).unwrap();

    let mut reversed = forward.clone();
    reversed.reverse();
    let mut rotated = forward.clone();
    rotated.rotate_left(2);

    for permutation in [reversed, rotated] {
        let point = engine.recommend_meeting_point(&permutation).unwrap();
        assert_eq!(point.location, expected.location);
        assert_eq!(point.shared_category, expected.shared_category);
        assert!((point.midpoint.latitude - expected.midpoint.latitude).abs() < 1e-9);
        assert!((point.midpoint.longitude - expected.midpoint.longitude).abs() < 1e-9);
    }
}

#[test]
fn test_meeting_point_rejects_bad_input() {
    let engine = recommender_from(&city_tsv());

    let mut bad_user = party();
    bad_user[2].user_id = 99;
    assert!(matches!(
        engine.recommend_meeting_point(&bad_user),
        Err(EngineError::Validation { field: "user_id", .. })
    ));

    let mut bad_location = party();
    bad_location[0].latitude = 123.0;
    assert!(matches!(
        engine.recommend_meeting_point(&bad_location),
        Err(EngineError::Validation { field: "latitude", .. })
    ));

    assert!(matches!(
        engine.recommend_meeting_point(&party()[..3]),
        Err(EngineError::Validation { field: "participants", .. })
    ));
}

#[test]
fn test_geofence_contains_the_median() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let len = rng.gen_range(1..40);
        let mut values: Vec<f64> = (0..len).map(|_| rng.gen_range(-5.0..5.0)).collect();
        let fence = Geofence::from_scalars(&values).unwrap();

        values.sort_by(f64::total_cmp);
        let median = quantile(&values, 0.5);
        assert!(fence.low <= median && median <= fence.high);
    }
}

#[test]
fn test_ratio_metric_still_recommends() {
    let dataset = Dataset::from_reader(city_tsv().as_bytes()).unwrap();
    let engine = Recommender::new(
        Arc::new(dataset),
        EngineSettings {
            location_metric: LocationMetric::Ratio,
            ..EngineSettings::default()
        },
    );

    for category in CATEGORIES {
        let venues = engine.recommend_venues(3, category).unwrap();
        assert!(venues.len() <= RECOMMENDATION_LIMIT);
    }
}

#[test]
fn test_category_validation() {
    let engine = recommender_from(&city_tsv());

    assert_eq!(engine.validate_category_name("Coffee").as_deref(), Some("Coffee Shop"));
    assert_eq!(engine.validate_category_name("Gym").as_deref(), Some("Gym / Fitness Center"));
    assert_eq!(engine.validate_category_name("coffee"), None);
    assert!(engine.validate_user_id(25));
    assert!(!engine.validate_user_id(26));
}

fn ratio_recommender_from(tsv: &str) -> Recommender {
    let dataset = Dataset::from_reader(tsv.as_bytes()).unwrap();
    Recommender::new(
        Arc::new(dataset),
        EngineSettings {
            location_metric: LocationMetric::Ratio,
            ..EngineSettings::default()
        },
    )
}

/// Users 1 and 3 only, so user 2 is in range without any check-ins
fn gap_tsv() -> String {
    let mut tsv = String::new();
    for (user, lon) in [(1u32, -74.00), (3, -73.95)] {
        for visit in 0..4 {
            let lat = 40.70 + f64::from(visit) * 0.01;
            tsv.push_str(&row(user, &format!("bar-{user}-{visit}"), "Bar", lat, lon));
        }
        tsv.push_str(&row(user, &format!("pub-{user}"), "Pub", 40.71, lon));
        tsv.push_str(&row(user, &format!("gym-{user}"), "Gym", 40.80, lon));
    }
    tsv
}

#[test]
fn test_user_without_check_ins_gets_no_venues() {
    let tsv = gap_tsv();

    for engine in [recommender_from(&tsv), ratio_recommender_from(&tsv)] {
        assert!(engine.validate_user_id(2));
        let venues = engine.recommend_venues(2, "Bar").unwrap();
        assert!(venues.is_empty());
    }
}

#[test]
fn test_user_without_check_ins_has_no_similar_users() {
    let engine = recommender_from(&gap_tsv());

    match engine.recommend_similar_users(2) {
        Err(EngineError::InsufficientData(message)) => {
            assert_eq!(message, "user 2 has no check-ins");
        }
        other => panic!("expected insufficient data, got {:?}", other),
    }
}

#[test]
fn test_ratio_metric_with_usual_area_on_prime_meridian() {
    // user 1's only frequent category is Bar, and every Bar check-in is at lon 0
    let mut tsv = String::new();
    for visit in 0..5 {
        let lat = 51.47 + f64::from(visit) * 0.01;
        tsv.push_str(&row(1, &format!("bar-{visit}"), "Bar", lat, 0.0));
    }
    tsv.push_str(&row(1, "pub-1", "Pub", 51.50, 0.0));
    for user in 2..=4u32 {
        let lon = -0.10 - f64::from(user) * 0.01;
        tsv.push_str(&row(user, &format!("pub-{user}"), "Pub", 51.51, lon));
        tsv.push_str(&row(user, &format!("cafe-{user}"), "Cafe", 51.52, lon));
        tsv.push_str(&row(user, &format!("deli-{user}"), "Deli", 51.53, lon));
    }
    let engine = ratio_recommender_from(&tsv);

    for category in ["Bar", "Pub", "Cafe"] {
        let venues = engine.recommend_venues(1, category).unwrap();
        assert!(venues.is_empty());
    }
}
