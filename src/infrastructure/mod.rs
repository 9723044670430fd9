pub mod embeddings;
pub mod sqlite;
