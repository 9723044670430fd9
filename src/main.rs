use campusrag::cli::commands::{Cli, Commands};
use campusrag::cli::input::{parse_batch, parse_event, parse_filter};
use campusrag::config::Settings;
use campusrag::domain::entities::document::Document;
use campusrag::CampusRag;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("campusrag=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rag = match Settings::from_env().and_then(|s| CampusRag::new(&s)) {
        Ok(rag) => rag,
        Err(e) => {
            eprintln!("Error initializing campusrag: {e}");
            std::process::exit(1);
        }
    };

    let result = run_command(&rag, cli.command).await;
    rag.cleanup();
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(rag: &CampusRag, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ingest { json } => {
            let document: Document = serde_json::from_str(&json)?;
            print_json(&rag.ingest(&document).await?)?;
        }
        Commands::Import { file, skip_duplicates } => {
            let raw = std::fs::read_to_string(&file)?;
            let (documents, mut options) = parse_batch(&raw)?;
            options.skip_duplicates |= skip_duplicates;
            let report = rag.batch_ingest(&documents, options).await;
            print_json(&report)?;
            if !report.ok {
                return Err(format!("{} of {} documents failed", report.errors.len(), documents.len()).into());
            }
        }
        Commands::Search {
            query,
            k,
            filters,
            from,
            to,
            time_from,
            time_to,
        } => {
            let filter = parse_filter(
                &filters,
                from.as_deref(),
                to.as_deref(),
                time_from.as_deref(),
                time_to.as_deref(),
            )?;
            let results = if filter.is_empty() {
                rag.search(&query, k).await?
            } else {
                rag.search_filtered(&query, k, &filter).await?
            };
            print_json(&results)?;
        }
        Commands::Get { id } => print_json(&rag.get(&id)?)?,
        Commands::Document { id } => {
            let document = rag
                .get_document(&id)?
                .ok_or_else(|| format!("Document {id} not found"))?;
            print_json(&document)?;
        }
        Commands::List { limit, offset } => print_json(&rag.list_documents(limit, offset)?)?,
        Commands::Delete { id } => {
            let removed = rag.delete_document(&id)?;
            println!("Deleted {id} ({removed} records)");
        }
        Commands::DeleteAll => {
            let removed = rag.delete_all()?;
            println!("Deleted {removed} records");
        }
        Commands::Reset => {
            rag.reset()?;
            println!("Collection reset");
        }
        Commands::Stats => print_json(&rag.stats())?,
        Commands::Export => print_json(&rag.export()?)?,
        Commands::Probe => print_json(&rag.probe().await?)?,
        Commands::EmbedDim => match rag.model_dimension().await? {
            Some(dim) => println!("{dim}"),
            None => return Err("embedding provider unavailable".into()),
        },
        Commands::EventAdd { json } => {
            let event = parse_event(&json)?;
            let report = rag.ingest_event(&event).await?;
            print_json(&serde_json::json!({ "event": event, "ingest": report }))?;
        }
        Commands::EventRemove { id } => {
            if !rag.remove_event(&id)? {
                return Err(format!("Event {id} is not indexed").into());
            }
            println!("Removed event {id}");
        }
        Commands::Events { date } => print_json(&rag.list_events(date.as_deref())?)?,
        Commands::SearchEvents { query, k } => print_json(&rag.search_events(&query, k).await?)?,
    }
    Ok(())
}
