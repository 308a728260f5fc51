pub mod clustering;
pub mod frequency;
pub mod geofence;
pub mod kmeans;
pub mod meeting_point;
pub mod similarity;
pub mod validation;
pub mod venues;

use std::sync::Arc;

use crate::{
    cache::{CacheKey, CacheSlot},
    dataset::Dataset,
    error::{EngineError, EngineResult},
    models::{Participant, VenueRecommendation},
};

use clustering::CategoryClusters;
use geofence::LocationMetric;
use meeting_point::MeetingPoint;
use similarity::UserCategoryMatrix;

/// Upper bound on venues returned per recommendation
pub const RECOMMENDATION_LIMIT: usize = 10;

/// Number of similar users returned per query
pub const SIMILAR_USER_LIMIT: usize = 10;

/// Tunables of the recommendation engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub cluster_seed: u64,
    pub sample_fraction: f64,
    pub location_metric: LocationMetric,
    pub cache_derived: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cluster_seed: 42,
            sample_fraction: 0.1,
            location_metric: LocationMetric::default(),
            cache_derived: true,
        }
    }
}

/// Entry point of the engine: owns the dataset and the artifacts derived from it
///
/// Every operation validates its input before any computation, so a bad
/// request never triggers clustering. Derived artifacts are computed on first
/// use and shared afterwards unless caching is disabled.
pub struct Recommender {
    dataset: Arc<Dataset>,
    settings: EngineSettings,
    clusters: CacheSlot<CategoryClusters>,
    user_matrix: CacheSlot<UserCategoryMatrix>,
}

impl Recommender {
    pub fn new(dataset: Arc<Dataset>, settings: EngineSettings) -> Self {
        Self {
            dataset,
            settings,
            clusters: CacheSlot::new(CacheKey::CategoryClusters, settings.cache_derived),
            user_matrix: CacheSlot::new(CacheKey::UserCategoryMatrix, settings.cache_derived),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Category clusters, fitted on first use
    pub fn clusters(&self) -> EngineResult<Arc<CategoryClusters>> {
        self.clusters.get_or_try_init(|| {
            clustering::cluster_categories(
                &self.dataset,
                self.settings.cluster_seed,
                self.settings.sample_fraction,
            )
        })
    }

    pub fn user_matrix(&self) -> EngineResult<Arc<UserCategoryMatrix>> {
        self.user_matrix
            .get_or_try_init(|| UserCategoryMatrix::build(&self.dataset))
    }

    /// Up to ten unvisited venues in categories like `category_name`
    ///
    /// `category_name` must be an exact known name; resolve free text with
    /// [`Recommender::validate_category_name`] first.
    pub fn recommend_venues(
        &self,
        user_id: i64,
        category_name: &str,
    ) -> EngineResult<Vec<VenueRecommendation>> {
        let user_id = validation::check_user_id(&self.dataset, user_id)?;
        if !self.dataset.has_category(category_name) {
            return Err(EngineError::validation(
                "category",
                format!("unknown category '{}'", category_name),
            ));
        }

        let clusters = self.clusters()?;
        venues::recommend_venues(
            &self.dataset,
            &clusters,
            user_id,
            category_name,
            self.settings.location_metric,
            RECOMMENDATION_LIMIT,
        )
    }

    /// The ten users whose category visits point the same way as `user_id`'s
    pub fn recommend_similar_users(&self, user_id: i64) -> EngineResult<Vec<u32>> {
        let user_id = validation::check_user_id(&self.dataset, user_id)?;
        let matrix = self.user_matrix()?;
        let similar = similarity::similar_users(&matrix, user_id, SIMILAR_USER_LIMIT)?;

        tracing::info!(user_id, returned = similar.len(), "Similar users ranked");

        Ok(similar.into_iter().map(|u| u.user_id).collect())
    }

    pub fn recommend_meeting_point(
        &self,
        participants: &[Participant],
    ) -> EngineResult<MeetingPoint> {
        let party = validation::check_participants(&self.dataset, participants)?;
        meeting_point::resolve_meeting_point(&self.dataset, &party)
    }

    pub fn validate_user_id(&self, id: i64) -> bool {
        validation::is_valid_user_id(&self.dataset, id)
    }

    /// Resolves free text to a known category name
    pub fn validate_category_name(&self, name: &str) -> Option<String> {
        validation::match_category_name(&self.dataset, name)
    }
}
