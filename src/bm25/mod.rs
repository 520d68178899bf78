//! BM25 lexical index with code-aware tokenization.
//!
//! Classic BM25 (`k1 = 1.2`, `b = 0.75` by default) over a corpus of
//! documents identified by a 64-bit id. Re-indexing an existing document
//! id is a single writer-lock critical section: the old postings are
//! removed before the new ones are added, so concurrent searches never
//! observe a half-updated document.
pub mod tokenizer;

use crate::error::AgramaResult;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, trace};

/// Tunable BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone)]
struct DocRecord {
    path: String,
    length: usize,
    term_counts: HashMap<String, u32>,
}

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<u64, DocRecord>,
    /// Document frequency per term: how many documents contain it.
    doc_freq: HashMap<String, u32>,
    total_length: u64,
}

impl Inner {
    fn avgdl(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.docs.len() as f32
        }
    }

    fn remove_doc(&mut self, id: u64) {
        if let Some(record) = self.docs.remove(&id) {
            self.total_length -= record.length as u64;
            for term in record.term_counts.keys() {
                if let Some(df) = self.doc_freq.get_mut(term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.doc_freq.remove(term);
                    }
                }
            }
        }
    }
}

/// A document result from a BM25 query.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Match {
    pub doc_id: u64,
    pub path: String,
    pub score: f32,
    pub matching_terms: Vec<String>,
}

/// Inverted-index BM25 search engine over a corpus of code/text documents.
#[derive(Debug)]
pub struct Bm25Index {
    config: Bm25Config,
    inner: RwLock<Inner>,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(Bm25Config::default())
    }
}

impl Bm25Index {
    pub fn new(config: Bm25Config) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Tokenize and index `content` under `id`/`path`, returning the
    /// number of tokens indexed. Re-adding an existing `id` atomically
    /// replaces the prior entry with respect to concurrent searches.
    pub fn add_document(&self, id: u64, path: impl Into<String>, content: &str) -> AgramaResult<usize> {
        let tokens: Vec<String> = tokenizer::tokenize(content).collect();
        let length = tokens.len();

        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| crate::error::AgramaError::internal("bm25 lock poisoned"))?;

        // Remove the old entry (if any) before indexing the new one so
        // searches never see a document with stale and fresh postings
        // mixed together.
        inner.remove_doc(id);

        for term in term_counts.keys() {
            *inner.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        inner.total_length += length as u64;
        let path = path.into();
        debug!(doc_id = id, %path, tokens = length, "bm25 add_document");
        inner.docs.insert(id, DocRecord { path, length, term_counts });

        Ok(length)
    }

    /// Remove a document from the index, if present.
    pub fn remove_document(&self, id: u64) -> AgramaResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| crate::error::AgramaError::internal("bm25 lock poisoned"))?;
        inner.remove_doc(id);
        Ok(())
    }

    /// Score a single document against a query's tokens. Exposed so the
    /// hybrid search engine and tests can evaluate score without a full
    /// top-k scan.
    pub fn score(&self, doc_id: u64, query_text: &str) -> f32 {
        let inner = match self.inner.read() {
            Ok(inner) => inner,
            Err(_) => return 0.0,
        };
        let Some(doc) = inner.docs.get(&doc_id) else {
            return 0.0;
        };
        let query_terms: Vec<String> = tokenizer::tokenize(query_text).collect();
        Self::score_doc(&inner, doc, &query_terms, self.config)
    }

    fn score_doc(inner: &Inner, doc: &DocRecord, query_terms: &[String], config: Bm25Config) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let n = inner.docs.len() as f32;
        let avgdl = inner.avgdl();
        let mut score = 0.0f32;

        for term in query_terms {
            let Some(&tf) = doc.term_counts.get(term) else {
                continue;
            };
            let df = *inner.doc_freq.get(term).unwrap_or(&0) as f32;
            if df == 0.0 {
                continue;
            }
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let tf = tf as f32;
            let denom = tf + config.k1 * (1.0 - config.b + config.b * (doc.length as f32 / avgdl.max(1.0)));
            score += idf * (tf * (config.k1 + 1.0)) / denom;
        }

        score
    }

    /// Search the corpus for the top-`k` documents matching `query_text`.
    ///
    /// Ties are broken by ascending document id. Returns an empty result
    /// for an empty query (not an error). If `k` exceeds the number of
    /// matches, all matches are returned.
    pub fn search(&self, query_text: &str, k: usize) -> Vec<Bm25Match> {
        trace!(query = query_text, k, "bm25 search");
        let query_terms: Vec<String> = tokenizer::tokenize(query_text).collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let inner = match self.inner.read() {
            Ok(inner) => inner,
            Err(_) => return Vec::new(),
        };

        let mut results: Vec<Bm25Match> = inner
            .docs
            .iter()
            .filter_map(|(&id, doc)| {
                let matching: Vec<String> = query_terms
                    .iter()
                    .filter(|t| doc.term_counts.contains_key(*t))
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    return None;
                }
                let score = Self::score_doc(&inner, doc, &query_terms, self.config);
                Some(Bm25Match {
                    doc_id: id,
                    path: doc.path.clone(),
                    score,
                    matching_terms: matching,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        results.truncate(k);
        results
    }

    /// Number of documents currently indexed.
    pub fn document_count(&self) -> usize {
        self.inner.read().map(|i| i.docs.len()).unwrap_or(0)
    }

    /// Average document length across the corpus.
    pub fn average_document_length(&self) -> f32 {
        self.inner.read().map(|i| i.avgdl()).unwrap_or(0.0)
    }
}
