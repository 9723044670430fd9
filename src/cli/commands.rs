use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "campusrag", about = "Semantic search over campus activities and schedules")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest one document
    Ingest {
        /// JSON with id, text and optional metadata
        json: String,
    },
    /// Import documents from a JSON file
    Import {
        /// File holding `{"documents": [...], "options": {...}}` or a bare array
        file: String,
        #[arg(long)]
        skip_duplicates: bool,
    },
    /// Semantic search
    Search {
        query: String,
        #[arg(long, default_value = "5")]
        k: usize,
        /// Only records whose metadata has key=value (repeatable)
        #[arg(long = "where", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Earliest `date` metadata (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest `date` metadata (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Only events still running after this time (HH:MM)
        #[arg(long)]
        time_from: Option<String>,
        /// Only events starting before this time (HH:MM)
        #[arg(long)]
        time_to: Option<String>,
    },
    /// Show one stored record
    Get { id: String },
    /// Rebuild a document from its chunks
    Document { id: String },
    /// List stored documents
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Delete every record of a document
    Delete { id: String },
    /// Delete every record in the collection
    DeleteAll,
    /// Drop and recreate the collection
    Reset,
    /// Collection statistics
    Stats,
    /// Export all documents as JSON
    Export,
    /// Compare the model's dimension with the collection's
    Probe,
    /// Print the embedding model's dimension
    EmbedDim,
    /// Index a schedule event
    EventAdd {
        /// JSON with title, date, startTime, endTime, type and optional id, location, description
        json: String,
    },
    /// Remove a schedule event from the index
    EventRemove { id: String },
    /// List indexed schedule events
    Events {
        /// Only events on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Semantic search over schedule events
    SearchEvents {
        query: String,
        #[arg(long, default_value = "5")]
        k: usize,
    },
}
