use std::sync::Arc;

use crate::services::Recommender;

/// Shared application state
///
/// The engine is read-only after construction, so handlers share it without
/// any lock; derived artifacts are synchronized inside the engine.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
}

impl AppState {
    pub fn new(recommender: Recommender) -> Self {
        Self {
            recommender: Arc::new(recommender),
        }
    }
}
