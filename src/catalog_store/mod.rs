mod models;
mod schema;
mod store;
mod trait_def;
mod validation;

pub use models::*;
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogStore;
pub use validation::{
    validate_artist, validate_label, validate_release, validate_track, ValidationError,
};
