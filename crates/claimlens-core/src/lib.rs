pub mod schema;
pub mod tier;

pub use schema::{EMBED_DIM, SchemaError, feature_name, feature_names, validate_feature_names};
pub use tier::{PriorityTier, ReserveEstimate};
