use std::collections::HashMap;
use std::sync::Arc;

use docqa_rag::{
    Chunk, Chunker, DistanceMetric, HashingEmbeddingProvider, RagError, RecursiveChunker,
    SourceText, VectorIndex,
};

fn provider() -> Arc<HashingEmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::default())
}

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        source_path: "facts.txt".to_string(),
        start_offset: 0,
        sequence: 0,
        metadata: HashMap::new(),
    }
}

fn facts() -> Vec<Chunk> {
    vec![
        chunk("facts_0", "The sky is blue."),
        chunk("facts_1", "Grass is green in spring."),
        chunk("facts_2", "Invoices are due within thirty days."),
    ]
}

#[tokio::test]
async fn empty_index_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let index =
        VectorIndex::open_or_create(dir.path().join("index.json"), provider(), DistanceMetric::Cosine)
            .await
            .unwrap();

    assert!(index.is_empty().await);
    for k in [0, 1, 5, 100] {
        assert!(index.search("anything at all", k).await.unwrap().is_empty());
    }
    assert!(!dir.path().join("index.json").exists(), "opening must not write");
}

#[tokio::test]
async fn inserted_chunk_is_retrieved_first() {
    let dir = tempfile::tempdir().unwrap();
    let index =
        VectorIndex::open_or_create(dir.path().join("index.json"), provider(), DistanceMetric::Cosine)
            .await
            .unwrap();

    assert_eq!(index.insert(facts()).await.unwrap(), 3);
    assert_eq!(index.len().await, 3);

    for expected in facts() {
        let results = index.search(&expected.text, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, expected.text);
    }
}

#[tokio::test]
async fn insert_persists_and_reload_gives_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store").join("index.json");

    let before = {
        let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine)
            .await
            .unwrap();
        index.insert(facts()).await.unwrap();
        index.search("what colour is the sky", 3).await.unwrap()
    };
    assert!(path.exists());

    let reopened =
        VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();
    assert_eq!(reopened.len().await, 3);
    let after = reopened.search("what colour is the sky", 3).await.unwrap();

    let ids = |results: &[docqa_rag::SearchResult]| {
        results.iter().map(|r| (r.chunk.id.clone(), r.score)).collect::<Vec<_>>()
    };
    assert_eq!(ids(&before), ids(&after));
}

#[tokio::test]
async fn failed_persistence_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();

    // A non-empty directory at the index path makes the final rename fail.
    std::fs::create_dir_all(path.join("x")).unwrap();

    let err = index.insert(facts()).await.unwrap_err();
    assert!(matches!(err, RagError::PersistenceError { .. }), "got {err:?}");
    assert_eq!(index.len().await, 0);
    assert!(index.search("sky", 3).await.unwrap().is_empty());
    assert!(!dir.path().join("index.json.tmp").exists(), "temporary file left behind");
}

#[tokio::test]
async fn failed_persistence_keeps_earlier_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();
    index.insert(facts()).await.unwrap();

    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir_all(path.join("x")).unwrap();

    let extra = vec![chunk("notes_0", "Volcanoes erupt molten rock.")];
    let err = index.insert(extra).await.unwrap_err();
    assert!(matches!(err, RagError::PersistenceError { .. }), "got {err:?}");
    assert_eq!(index.len().await, 3);
    let results = index.search("volcanoes molten rock", 5).await.unwrap();
    assert!(results.iter().all(|r| r.chunk.id != "notes_0"));
    assert!(!dir.path().join("index.json.tmp").exists());
}

#[tokio::test]
async fn empty_insert_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();

    assert_eq!(index.insert(Vec::new()).await.unwrap(), 0);
    assert!(!path.exists());
}

#[tokio::test]
async fn undecodable_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    std::fs::write(&path, b"\x00\x01faiss-binary").unwrap();

    let err = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::CorruptIndex { .. }));
}

#[tokio::test]
async fn changing_embedding_dimensions_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();
    index.insert(facts()).await.unwrap();

    let smaller = Arc::new(HashingEmbeddingProvider::new(64).unwrap());
    let err = VectorIndex::open_or_create(&path, smaller, DistanceMetric::Cosine)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::CorruptIndex { .. }));
}

#[tokio::test]
async fn blank_placeholder_entries_never_match() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let dims = HashingEmbeddingProvider::DEFAULT_DIMENSIONS;

    let legacy = serde_json::json!({
        "format": "docqa-vector-index",
        "version": 1,
        "metric": "cosine",
        "dimensions": dims,
        "entries": [{
            "chunk": {
                "id": "placeholder",
                "text": "",
                "source_path": "",
                "start_offset": 0,
                "sequence": 0
            },
            "vector": vec![0.0f32; dims]
        }]
    });
    std::fs::write(&path, serde_json::to_vec(&legacy).unwrap()).unwrap();

    let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();
    assert_eq!(index.len().await, 1);
    assert!(index.search("", 5).await.unwrap().is_empty());

    index.insert(vec![chunk("facts_0", "The sky is blue.")]).await.unwrap();
    let results = index.search("sky", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.id, "facts_0");
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let index =
        VectorIndex::open_or_create(dir.path().join("index.json"), provider(), DistanceMetric::L2)
            .await
            .unwrap();

    index
        .insert(vec![chunk("first", "same words"), chunk("second", "same words")])
        .await
        .unwrap();

    let results = index.search("same words", 2).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[tokio::test]
async fn persisted_metric_wins_over_requested() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    let index = VectorIndex::open_or_create(&path, provider(), DistanceMetric::L2).await.unwrap();
    index.insert(facts()).await.unwrap();

    let reopened =
        VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();
    assert_eq!(reopened.metric(), DistanceMetric::L2);
}

#[tokio::test]
async fn concurrent_inserts_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let index = Arc::new(
        VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap(),
    );

    let chunker = RecursiveChunker::new(200, 40);
    let mut handles = Vec::new();
    for i in 0..8 {
        let index = Arc::clone(&index);
        let chunks =
            chunker.chunk(&SourceText::new(format!("doc{i}.txt"), format!("document number {i}")));
        handles.push(tokio::spawn(async move { index.insert(chunks).await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    let reopened =
        VectorIndex::open_or_create(&path, provider(), DistanceMetric::Cosine).await.unwrap();
    assert_eq!(reopened.len().await, 8);
}
