pub mod admin;
pub mod embedder;
pub mod events;
pub mod retrieval;
