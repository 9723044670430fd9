pub mod dimension_policy;
pub mod embedding;
pub mod metadata_filter;
