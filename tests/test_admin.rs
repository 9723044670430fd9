mod common;

use campusrag::application::retrieval::RetrievalConfig;
use campusrag::domain::chunker::ChunkingConfig;
use campusrag::domain::entities::document::Document;
use campusrag::domain::error::DomainError;
use campusrag::domain::ports::vector_store::StoreHealth;
use campusrag::domain::values::dimension_policy::DimensionPolicy;
use campusrag::infrastructure::embeddings::hashed::HashedProvider;
use campusrag::CampusRag;
use common::{memory_store, settings, setup};
use std::sync::Arc;

async fn seeded() -> CampusRag {
    let rag = setup();
    for (id, text) in [
        ("evt-1", "AI Salon Saturday 2pm Library Hall"),
        ("evt-2", "Basketball tryouts Friday"),
        ("evt-3", "Volunteer day at the food bank"),
    ] {
        rag.ingest(&Document::new(id, text).with_metadata("source", "test"))
            .await
            .unwrap();
    }
    rag
}

#[tokio::test]
async fn test_delete_all_then_stats_is_empty() {
    let rag = seeded().await;
    assert_eq!(rag.delete_all().unwrap(), 3);

    let stats = rag.stats();
    assert_eq!(stats.document_count, 0);
    assert_eq!(stats.record_count, 0);
    assert_eq!(stats.embedding_dimension, None);
    assert_eq!(stats.health, Some(StoreHealth::Empty));
    assert!(rag.search("AI", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_describe_collection() {
    let rag = seeded().await;
    let stats = rag.stats();
    assert_eq!(stats.document_count, 3);
    assert_eq!(stats.embedding_dimension, Some(256));
    assert_eq!(stats.collection_name, "campus_acts");
    assert_eq!(stats.store_status, "connected");
    assert_eq!(stats.health, Some(StoreHealth::Healthy));
    assert!(stats.storage_size_bytes > 0);
    assert!(stats.storage_size_formatted.ends_with('B'));
    assert!(stats.last_updated.is_some());
}

#[tokio::test]
async fn test_list_pages_through_documents() {
    let rag = seeded().await;
    let first = rag.list_documents(2, 0).unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].id, "evt-1");
    let rest = rag.list_documents(2, 2).unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].id, "evt-3");
    assert_eq!(rest.items[0].text, "Volunteer day at the food bank");
}

#[tokio::test]
async fn test_export_contains_every_document() {
    let rag = seeded().await;
    let export = rag.export().unwrap();
    assert_eq!(export.count, 3);
    assert!(export.documents.iter().all(|d| d.metadata["source"] == "test"));

    let json = serde_json::to_value(&export).unwrap();
    assert_eq!(json["documents"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_chunked_documents_list_and_export_whole() {
    let mut s = settings();
    s.retrieval = RetrievalConfig {
        chunking: ChunkingConfig::new(60, 10).unwrap(),
        chunk_threshold: 60,
    };
    let rag = CampusRag::with_providers(
        Arc::new(HashedProvider::default()),
        memory_store(DimensionPolicy::Recreate),
        &s,
    )
    .unwrap();
    let long = "The robotics club meets every Tuesday. Members build rovers for the spring contest. \
                New students are welcome and no experience is needed. Bring a laptop if you have one.";
    let report = rag
        .ingest(&Document::new("robotics", long).with_metadata("club", "robotics"))
        .await
        .unwrap();
    assert!(report.chunks > 1);
    rag.ingest(&Document::new("chess", "Chess club Thursday")).await.unwrap();

    let stats = rag.stats();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.record_count, report.chunks + 1);

    let page = rag.list_documents(10, 0).unwrap();
    assert_eq!(page.total, stats.document_count);
    let ids: Vec<&str> = page.items.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["chess", "robotics"]);
    assert_eq!(page.items[1].text, long);
    assert_eq!(page.items[1].metadata.len(), 1);

    let export = rag.export().unwrap();
    assert_eq!(export.count, 2);
    assert_eq!(export.documents, page.items);
}

#[tokio::test]
async fn test_get_and_delete_document() {
    let rag = seeded().await;
    assert_eq!(rag.get("evt-2").unwrap().text, "Basketball tryouts Friday");

    assert_eq!(rag.delete_document("evt-2").unwrap(), 1);
    assert!(matches!(rag.get("evt-2"), Err(DomainError::NotFound(_))));
    assert!(matches!(rag.delete_document("evt-2"), Err(DomainError::NotFound(_))));
    assert_eq!(rag.stats().document_count, 2);
}

#[tokio::test]
async fn test_reset_recreates_collection() {
    let rag = seeded().await;
    rag.reset().unwrap();
    assert_eq!(rag.stats().document_count, 0);

    rag.ingest(&Document::new("evt-4", "Career fair")).await.unwrap();
    assert_eq!(rag.stats().document_count, 1);
}
