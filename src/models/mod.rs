use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub mod profile;

pub use profile::{CategoryProfile, FrequentCategory, UserProfile};

/// Number of people a meeting point is resolved for
pub const MEETING_PARTY_SIZE: usize = 5;

/// Mean Earth radius used by the haversine distance
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// One observed visit: who, where, what kind of place and when
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckIn {
    pub user_id: u32,
    pub venue_id: String,
    pub category_id: String,
    pub category_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone_offset_min: i32,
    pub utc_time: DateTime<FixedOffset>,
}

impl CheckIn {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }

    /// Planar squared distance in degree space
    pub fn squared_distance(&self, other: &Coordinates) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        dlat * dlat + dlon * dlon
    }

    /// Great-circle distance in kilometres
    pub fn haversine_km(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    /// Latitude/longitude ratio, undefined on the prime meridian
    pub fn ratio(&self) -> Option<f64> {
        if self.longitude == 0.0 {
            None
        } else {
            Some(self.latitude / self.longitude)
        }
    }

    /// Component-wise mean; `None` for an empty slice
    pub fn mean(points: &[Coordinates]) -> Option<Coordinates> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (lat, lon) = points.iter().fold((0.0, 0.0), |(lat, lon), p| {
            (lat + p.latitude, lon + p.longitude)
        });
        Some(Coordinates::new(lat / n, lon / n))
    }
}

/// A venue suggested to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRecommendation {
    pub venue_id: String,
    pub category_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&CheckIn> for VenueRecommendation {
    fn from(row: &CheckIn) -> Self {
        Self {
            venue_id: row.venue_id.clone(),
            category_name: row.category_name.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }
}

/// One person taking part in a meeting point query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: u32,
    pub latitude: f64,
    pub longitude: f64,
}

impl Participant {
    pub fn new(user_id: u32, latitude: f64, longitude: f64) -> Self {
        Self {
            user_id,
            latitude,
            longitude,
        }
    }

    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}
