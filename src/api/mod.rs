mod handlers;
mod routes;
mod state;

pub use handlers::{
    CategoryMatchResponse, MeetingPointRequest, MeetingPointResponse, SimilarUsersResponse,
    VenueQuery, VenueResponse,
};
pub use routes::create_router;
pub use state::AppState;
