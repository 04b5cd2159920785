pub mod catalog;
pub mod features;
pub mod recommendation;

pub use catalog::{CatalogRecord, Song};
pub use features::{Feature, FeatureVector, FEATURE_COUNT};
pub use recommendation::{FeatureBreakdown, RecommendResponse, Recommendation};
