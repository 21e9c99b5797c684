//! Query-time retrieval: embed the query, ask the index, shape the result.

use std::sync::Arc;

use anyhow::Result;

use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::{RetrievalResult, RetrievedSource};

/// Turns a natural-language query into generation context plus a citation
/// list, preserving the index's relevance ranking.
///
/// Holds no per-request state; one instance serves all requests.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    excerpt_chars: usize,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            top_k,
            excerpt_chars,
        }
    }

    /// Retrieve the top-k most relevant documents for `query`.
    ///
    /// `context` is the document bodies joined with a blank line, in rank
    /// order; `sources` carries one excerpted entry per document in the same
    /// order. Fewer (or zero) hits than `top_k` is not an error — generation
    /// proceeds with whatever context exists.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let query_vec = self.embedder.embed(query).await?;
        let hits = self.index.top_k(&query_vec, self.top_k).await?;

        let context = hits
            .iter()
            .map(|d| d.body.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let sources = hits
            .iter()
            .map(|d| RetrievedSource {
                id: d.id.clone(),
                content: excerpt(&d.body, self.excerpt_chars),
            })
            .collect();

        Ok(RetrievalResult { context, sources })
    }
}

/// First `max_chars` characters of a body, with an ellipsis marker.
fn excerpt(body: &str, max_chars: usize) -> String {
    let head: String = body.chars().take(max_chars).collect();
    format!("{}...", head)
}
