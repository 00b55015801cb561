//! Service Layer
//!
//! Business logic behind the recommendation operations. Transport concerns
//! stay outside this module.

mod recommendation;

pub use recommendation::{CustomProviderSlot, RecommendationService, WEEK_DAYS};
