//! Hybrid lexical + vector retrieval over the newest documents of a data source.

use crate::config::{RagConfig, DEFAULT_RAG_WINDOW};
use crate::embeddings::local::tokenize;
use crate::embeddings::util::cosine_similarity;
use crate::embeddings::LocalEmbedding;
use crate::model::{RagDocument, ScoredDocument};
use crate::storage::Store;
use std::collections::{BTreeSet, HashSet};

const FULL_QUESTION_BONUS: f64 = 3.0;
const VECTOR_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalContextBuilder {
    pub embedder: LocalEmbedding,
    pub window: usize,
}

impl Default for RetrievalContextBuilder {
    fn default() -> Self {
        Self {
            embedder: LocalEmbedding::default(),
            window: DEFAULT_RAG_WINDOW,
        }
    }
}

impl RetrievalContextBuilder {
    pub fn from_config(cfg: &RagConfig) -> Self {
        Self {
            embedder: LocalEmbedding::new(cfg.dim),
            window: cfg.window.max(1),
        }
    }

    pub fn retrieve(
        &self,
        store: &Store,
        data_source_id: &str,
        question: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredDocument>> {
        if question.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let model_id = self.embedder.model_id();
        let mut candidates = store.recent_documents(data_source_id, self.window, &model_id)?;

        // documents indexed under another model get a vector for this one
        let mut backfilled = 0usize;
        for (doc, vec) in candidates.iter_mut().filter(|(_, v)| v.is_none()) {
            let fresh = self.embedder.embed(&doc.content);
            store.put_embedding(doc.id, &model_id, &fresh)?;
            *vec = Some(fresh);
            backfilled += 1;
        }
        if backfilled > 0 {
            tracing::debug!(event = "rag.embeddings_backfilled", data_source_id, model_id = %model_id, backfilled);
        }

        let ranked = self.rank(question, candidates, limit);
        tracing::debug!(
            event = "rag.retrieved",
            data_source_id,
            returned = ranked.len(),
            scored = ranked.iter().filter(|d| d.score > 0.0).count()
        );
        Ok(ranked)
    }

    /// Score `candidates` (newest first) and return at most `limit` of them.
    ///
    /// Documents with a positive score come first, best first; ties keep recency
    /// order. Remaining slots are padded with the newest unscored documents.
    pub fn rank(
        &self,
        question: &str,
        candidates: Vec<(RagDocument, Option<Vec<f64>>)>,
        limit: usize,
    ) -> Vec<ScoredDocument> {
        let question = question.trim();
        if question.is_empty() || limit == 0 {
            return Vec::new();
        }

        let lowered = question.to_lowercase();
        let tokens: BTreeSet<String> = tokenize(question).into_iter().collect();
        let query_vec = self.embedder.embed(question);

        let mut scored: Vec<ScoredDocument> = Vec::new();
        let mut unscored: Vec<RagDocument> = Vec::new();
        for (doc, vec) in candidates {
            let lexical = lexical_score(&lowered, &tokens, &doc.content);
            let vector = vec
                .as_deref()
                .map(|v| cosine_similarity(&query_vec, v).max(0.0))
                .unwrap_or(0.0);
            let score = lexical + VECTOR_WEIGHT * vector;
            if score > 0.0 {
                scored.push(ScoredDocument {
                    document: doc,
                    score,
                });
            } else {
                unscored.push(doc);
            }
        }

        // stable: equal scores stay newest first
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);

        let used: HashSet<i64> = scored.iter().map(|d| d.document.id).collect();
        let room = limit - scored.len();
        scored.extend(
            unscored
                .into_iter()
                .filter(|d| !used.contains(&d.id))
                .take(room)
                .map(|document| ScoredDocument {
                    document,
                    score: 0.0,
                }),
        );
        scored
    }
}

fn lexical_score(question: &str, tokens: &BTreeSet<String>, content: &str) -> f64 {
    let haystack = content.to_lowercase();
    if haystack.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    if haystack.contains(question) {
        score += FULL_QUESTION_BONUS;
    }
    score += tokens.iter().filter(|t| haystack.contains(t.as_str())).count() as f64;
    score
}

/// Render retrieved passages for a generation prompt.
pub fn format_context(docs: &[ScoredDocument]) -> String {
    docs.iter()
        .map(|d| match &d.document.ref_id {
            Some(r) => format!("[{}:{}] {}", d.document.doc_type, r, d.document.content),
            None => format!("[{}] {}", d.document.doc_type, d.document.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
