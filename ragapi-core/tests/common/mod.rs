//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ragapi_core::{
    DocumentId, EmbeddingProvider, GenerationProvider, InMemoryVectorStore, NO_DATA_REPLY, Prompt,
    RagConfig, RagError, RagPipeline, Result, Role, ScoredDocument, SimilarityMetric, VectorStore,
};

pub const DIM: usize = 64;

/// Deterministic bag-of-words embedder: each lowercase word is hashed into one
/// of `dimensions` buckets and the counts are L2-normalised, so texts that
/// share words end up close under cosine similarity.
pub struct BagOfWordsEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x100000001b3));
            v[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "bag-of-words"
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".to_string(),
            message: "model unavailable".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Embedder that returns vectors of the wrong length.
pub struct WrongDimensionEmbedder;

#[async_trait]
impl EmbeddingProvider for WrongDimensionEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM + 1])
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "wrong-dimension"
    }
}

/// Embedder that sleeps before answering.
pub struct SlowEmbedder {
    pub delay: Duration,
    pub inner: BagOfWordsEmbedder,
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "slow"
    }
}

type Reply = Box<dyn Fn(&Prompt) -> Result<String> + Send + Sync>;

/// Generation double that records every prompt it receives.
pub struct RecordingGenerator {
    reply: Reply,
    delay: Option<Duration>,
    prompts: Mutex<Vec<Prompt>>,
}

impl RecordingGenerator {
    /// Follows the "no data found" convention: answers [`NO_DATA_REPLY`] when
    /// the context section is empty, otherwise echoes the top context line.
    pub fn conventional() -> Self {
        Self::with_reply(|prompt| {
            let user = prompt.first_content(Role::User).unwrap_or_default();
            let context = user.split_once("Context:").map(|(_, c)| c.trim()).unwrap_or_default();
            if context.is_empty() {
                Ok(NO_DATA_REPLY.to_string())
            } else {
                Ok(format!("Based on the context: {}", context.lines().next().unwrap_or_default()))
            }
        })
    }

    pub fn fixed(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::with_reply(move |_| Ok(reply.clone()))
    }

    pub fn failing() -> Self {
        Self::with_reply(|_| {
            Err(RagError::GenerationError {
                provider: "recording".to_string(),
                message: "upstream returned 500".to_string(),
            })
        })
    }

    pub fn with_reply(reply: impl Fn(&Prompt) -> Result<String> + Send + Sync + 'static) -> Self {
        Self { reply: Box::new(reply), delay: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.prompts.lock().unwrap().push(prompt.clone());
        (self.reply)(prompt)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Wraps an [`InMemoryVectorStore`], counting operations and the number of
/// "connections" currently checked out. A connection is held for the whole
/// duration of each call, including an optional artificial delay.
pub struct TrackedStore {
    inner: InMemoryVectorStore,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    operations: AtomicUsize,
}

struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TrackedStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: InMemoryVectorStore::new(dimensions),
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            operations: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    async fn acquire(&self) -> ConnectionGuard {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = ConnectionGuard(self.in_flight.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

#[async_trait]
impl VectorStore for TrackedStore {
    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        source_tag: &str,
    ) -> Result<DocumentId> {
        let _conn = self.acquire().await;
        self.inner.insert(content, embedding, source_tag).await
    }

    async fn search(
        &self,
        embedding: &[f32],
        source_tag: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let _conn = self.acquire().await;
        self.inner.search(embedding, source_tag, k).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn metric(&self) -> SimilarityMetric {
        self.inner.metric()
    }
}

pub fn config() -> RagConfig {
    RagConfig::builder().top_k(3).source_tag("docs").build().unwrap()
}

pub fn pipeline(
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    store: Arc<dyn VectorStore>,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config())
        .embedding_provider(embedder)
        .generation_provider(generator)
        .vector_store(store)
        .build()
        .unwrap()
}
