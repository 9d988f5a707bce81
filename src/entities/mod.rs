pub mod fields;
pub mod paginate;
pub mod query;
pub mod stats;
pub mod trial;
