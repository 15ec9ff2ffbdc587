use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_rag::{
    CompletionModel, DistanceMetric, GENERATION_FAILED_ANSWER, HashingEmbeddingProvider,
    NO_CONTEXT_ANSWER, RagConfig, RagError, RagPipeline, RemoteModelError, SourceText,
    VectorIndex,
};

/// Answers with the context section of the prompt it was given.
#[derive(Default)]
struct EchoContextModel {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionModel for EchoContextModel {
    fn name(&self) -> &str {
        "echo-context"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RemoteModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let context = prompt
            .split("Context:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nAnswer:").next())
            .unwrap_or_default();
        Ok(format!("  {context}  \n"))
    }
}

struct FailingModel {
    error: RemoteModelError,
}

#[async_trait]
impl CompletionModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, RemoteModelError> {
        Err(self.error.clone())
    }
}

async fn pipeline(
    dir: &tempfile::TempDir,
    model: Arc<dyn CompletionModel>,
) -> RagPipeline {
    let index = VectorIndex::open_or_create(
        dir.path().join("vectorstore").join("index.json"),
        Arc::new(HashingEmbeddingProvider::default()),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();

    RagPipeline::builder()
        .config(RagConfig::default())
        .index(Arc::new(index))
        .completion_model(model)
        .build()
        .unwrap()
}

#[tokio::test]
async fn empty_index_answers_with_fallback_without_calling_model() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(EchoContextModel::default());
    let pipeline = pipeline(&dir, model.clone()).await;

    let answer = pipeline.answer("What color is the sky?").await.unwrap();

    assert_eq!(answer, NO_CONTEXT_ANSWER);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn answer_is_grounded_in_ingested_text() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(EchoContextModel::default());
    let pipeline = pipeline(&dir, model.clone()).await;

    let added = pipeline
        .ingest_text(SourceText::new("pdfs/facts.txt", "The sky is blue."))
        .await
        .unwrap();
    assert_eq!(added, 1);

    let answer = pipeline.answer("What color is the sky?").await.unwrap();

    assert_eq!(answer, "The sky is blue.");
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ingest_file_extracts_chunks_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, Arc::new(EchoContextModel::default())).await;

    let path = dir.path().join("handbook.txt");
    let paragraph = "Employees accrue two vacation days per month of service. ";
    std::fs::write(&path, paragraph.repeat(60)).unwrap();

    let added = pipeline.ingest_file(&path).await.unwrap();
    assert!(added > 1, "a long document must produce several chunks");
    assert_eq!(pipeline.index().len().await, added);
    assert!(pipeline.index().path().exists());

    let hits = pipeline.search("vacation days", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.chunk.source_path.ends_with("handbook.txt")));
}

#[tokio::test]
async fn whitespace_only_document_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, Arc::new(EchoContextModel::default())).await;

    let added = pipeline.ingest_text(SourceText::new("blank.txt", " \n\n\t ")).await.unwrap();

    assert_eq!(added, 0);
    assert!(pipeline.index().is_empty().await);
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, Arc::new(EchoContextModel::default())).await;

    let path = dir.path().join("sheet.xlsx");
    std::fs::write(&path, b"PK").unwrap();

    let err = pipeline.ingest_file(&path).await.unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFileType { .. }));
    assert!(pipeline.index().is_empty().await);
}

#[tokio::test]
async fn model_failures_become_the_generic_answer() {
    for error in [
        RemoteModelError::Timeout,
        RemoteModelError::RateLimited("quota".into()),
        RemoteModelError::Unauthorized("bad key".into()),
        RemoteModelError::EmptyResponse,
    ] {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(FailingModel { error })).await;
        pipeline.ingest_text(SourceText::new("facts.txt", "The sky is blue.")).await.unwrap();

        let answer = pipeline.answer("What color is the sky?").await.unwrap();
        assert_eq!(answer, GENERATION_FAILED_ANSWER);
    }
}

#[tokio::test]
async fn builder_requires_index_and_model() {
    assert!(matches!(RagPipeline::builder().build(), Err(RagError::ConfigError(_))));

    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::open_or_create(
        dir.path().join("index.json"),
        Arc::new(HashingEmbeddingProvider::default()),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();
    let result = RagPipeline::builder().index(Arc::new(index)).build();
    assert!(matches!(result, Err(RagError::ConfigError(_))));
}
