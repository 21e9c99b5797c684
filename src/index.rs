//! Vector index abstraction and the in-memory demo implementation.
//!
//! The [`VectorIndex`] trait is the seam between the retrieval pipeline and
//! whatever actually stores document embeddings. The bundled
//! [`InMemoryIndex`] is brute-force cosine similarity over a `RwLock`-guarded
//! vector — fine for the demo corpus, concurrent-read safe, and the only
//! backend this crate ships. Indexing happens once at startup
//! ([`seed_demo_corpus`]); per-request access is read-only.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::Embedder;

/// A document stored in the index alongside its embedding.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub body: String,
    pub vector: Vec<f32>,
}

/// A document returned from a nearest-neighbor query, most similar first.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: String,
    pub body: String,
    pub score: f32,
}

/// Nearest-neighbor store for document embeddings.
///
/// Implementations own their concurrent-read safety. The distance metric is
/// the implementation's choice; callers only rely on the most-relevant-first
/// ordering of [`top_k`](VectorIndex::top_k).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add a document to the index.
    async fn add(&self, doc: IndexedDocument) -> Result<()>;

    /// Return the `k` most similar documents to `query_vec`, best first.
    /// May return fewer than `k` when the index is small; never errors on
    /// an empty index.
    async fn top_k(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Number of indexed documents.
    async fn count(&self) -> Result<usize>;
}

/// In-memory index with brute-force cosine search.
pub struct InMemoryIndex {
    docs: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, doc: IndexedDocument) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.retain(|d| d.id != doc.id);
        docs.push(doc);
        Ok(())
    }

    async fn top_k(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let docs = self.docs.read().unwrap();
        let mut scored: Vec<ScoredDocument> = docs
            .iter()
            .map(|d| ScoredDocument {
                id: d.id.clone(),
                body: d.body.clone(),
                score: cosine_similarity(query_vec, &d.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.docs.read().unwrap().len())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// The built-in knowledge base. A real deployment would ingest documents
/// from files or APIs; the demo indexes these five at startup.
pub const DEMO_CORPUS: &[(&str, &str)] = &[
    (
        "doc_0",
        "RAG (Retrieval Augmented Generation) is a technique that enhances LLM responses by first retrieving relevant information.",
    ),
    (
        "doc_1",
        "Guardrails provide safety mechanisms for LLM outputs to prevent harmful content.",
    ),
    (
        "doc_2",
        "Kubernetes is an open-source platform for managing containerized workloads and services.",
    ),
    (
        "doc_3",
        "Docker containers package up code and all its dependencies so the application runs quickly and reliably.",
    ),
    (
        "doc_4",
        "Python is a high-level, interpreted programming language known for its readability and versatility.",
    ),
];

/// Embed and index the demo corpus. Called once during pipeline assembly.
pub async fn seed_demo_corpus(index: &dyn VectorIndex, embedder: &dyn Embedder) -> Result<()> {
    for (id, body) in DEMO_CORPUS {
        let vector = embedder.embed(body).await?;
        index
            .add(IndexedDocument {
                id: id.to_string(),
                body: body.to_string(),
                vector,
            })
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    fn doc(id: &str, vector: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            body: format!("body of {}", id),
            vector,
        }
    }

    #[tokio::test]
    async fn test_top_k_orders_by_similarity() {
        let index = InMemoryIndex::new();
        index.add(doc("far", vec![0.0, 1.0])).await.unwrap();
        index.add(doc("near", vec![1.0, 0.1])).await.unwrap();
        index.add(doc("exact", vec![1.0, 0.0])).await.unwrap();

        let hits = index.top_k(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "exact");
        assert_eq!(hits[1].id, "near");
    }

    #[tokio::test]
    async fn test_top_k_returns_fewer_when_index_small() {
        let index = InMemoryIndex::new();
        index.add(doc("only", vec![1.0, 0.0])).await.unwrap();

        let hits = index.top_k(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_top_k_on_empty_index() {
        let index = InMemoryIndex::new();
        let hits = index.top_k(&[1.0, 0.0], 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let index = InMemoryIndex::new();
        index.add(doc("a", vec![1.0, 0.0])).await.unwrap();
        index.add(doc("a", vec![0.0, 1.0])).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_demo_corpus() {
        let index = InMemoryIndex::new();
        let embedder = HashedEmbedder::new(128);
        seed_demo_corpus(&index, &embedder).await.unwrap();
        assert_eq!(index.count().await.unwrap(), DEMO_CORPUS.len());
    }
}
