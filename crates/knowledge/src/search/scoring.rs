//! Ranking primitives for the in-memory index: BM25, cosine similarity,
//! weighted hybrid fusion, term-overlap re-ranking and extractive captions.
//!
//! The re-ranker and captions are lexical stand-ins for a hosted semantic
//! ranker; they keep the same 0-4 scale so thresholds carry over.

use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

/// Upper bound of the re-ranker scale.
pub const MAX_RERANKER_SCORE: f64 = 4.0;

/// Weight of the lexical signal in hybrid scores; vectors get the rest.
pub const HYBRID_TEXT_WEIGHT: f64 = 0.5;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Lowercased word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// IDF = ln(1 + (N - df + 0.5) / (df + 0.5)); zero for unseen terms, never
/// negative.
pub fn calculate_idf(total_documents: f64, doc_frequency: usize) -> f64 {
    if doc_frequency == 0 {
        return 0.0;
    }
    let df = doc_frequency as f64;
    (1.0 + ((total_documents - df + 0.5) / (df + 0.5)).max(0.0)).ln()
}

/// Length-normalised term frequency: tf / (1 - b + b * len / avg_len).
pub fn normalized_term_frequency(tf: usize, length: usize, average_length: f64, b: f64) -> f64 {
    if average_length <= 0.0 || tf == 0 {
        return 0.0;
    }
    let denominator = 1.0 - b + b * (length as f64 / average_length);
    if denominator > 0.0 {
        tf as f64 / denominator
    } else {
        0.0
    }
}

/// BM25 saturation: ((k1 + 1) * x) / (k1 + x).
pub fn saturate(score: f64, k1: f64) -> f64 {
    if !score.is_finite() || score <= 0.0 {
        return 0.0;
    }
    ((k1 + 1.0) * score) / (k1 + score)
}

/// Corpus statistics for Okapi BM25.
#[derive(Debug, Default)]
pub struct Bm25 {
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
}

impl Bm25 {
    pub fn new<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = Self::default();

        for text in documents {
            let tokens = tokenize(text);
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *index.doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            index.doc_lens.push(tokens.len());
            index.term_freqs.push(tf);
        }

        let total: usize = index.doc_lens.iter().sum();
        index.avg_len = if index.doc_lens.is_empty() {
            0.0
        } else {
            total as f64 / index.doc_lens.len() as f64
        };

        index
    }

    pub fn idf(&self, term: &str) -> f64 {
        calculate_idf(
            self.doc_lens.len() as f64,
            self.doc_freq.get(term).copied().unwrap_or(0),
        )
    }

    /// BM25 score of document `doc` for the query terms.
    pub fn score(&self, doc: usize, query_terms: &[String]) -> f64 {
        let (Some(tf), Some(len)) = (self.term_freqs.get(doc), self.doc_lens.get(doc)) else {
            return 0.0;
        };

        query_terms
            .iter()
            .filter_map(|term| tf.get(term).map(|f| (term, *f)))
            .map(|(term, f)| {
                let ntf = normalized_term_frequency(f, *len, self.avg_len, BM25_B);
                self.idf(term) * saturate(ntf, BM25_K1)
            })
            .sum()
    }
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Fuse normalised lexical and vector scores by a weighted mean.
///
/// A document missing from one list contributes zero for that signal, so a
/// fused score never exceeds the larger of the document's two scores: a
/// document below a threshold in both single modes stays below it here.
/// Output is sorted descending, ties broken by first appearance.
pub fn fuse_scores(text: &[(usize, f64)], vector: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let mut scores: HashMap<usize, f64> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();

    let weighted = [
        (text, HYBRID_TEXT_WEIGHT),
        (vector, 1.0 - HYBRID_TEXT_WEIGHT),
    ];
    for (ranking, weight) in weighted {
        for (id, score) in ranking {
            let entry = scores.entry(*id).or_insert_with(|| {
                order.push(*id);
                0.0
            });
            *entry += weight * score.clamp(0.0, 1.0);
        }
    }

    let mut fused: Vec<(usize, f64)> = order
        .into_iter()
        .map(|id| (id, scores.get(&id).copied().unwrap_or(0.0)))
        .collect();

    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

fn query_term_set(query: &str) -> HashSet<String> {
    tokenize(query)
        .into_iter()
        .filter(|t| t.chars().count() > 1)
        .collect()
}

/// Share of distinct query terms present in `text`, scaled to 0-4.
pub fn rerank_score(query: &str, text: &str) -> f64 {
    let query_terms = query_term_set(query);
    if query_terms.is_empty() {
        return 0.0;
    }

    let text_terms: HashSet<String> = tokenize(text).into_iter().collect();
    let matched = query_terms.iter().filter(|t| text_terms.contains(*t)).count();

    MAX_RERANKER_SCORE * matched as f64 / query_terms.len() as f64
}

/// Sentence of `text` sharing the most distinct terms with `query`.
pub fn best_caption(query: &str, text: &str) -> Option<String> {
    let query_terms = query_term_set(query);

    let mut best: Option<(&str, usize)> = None;
    for sentence in text.split_sentence_bounds() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let terms: HashSet<String> = tokenize(sentence).into_iter().collect();
        let overlap = query_terms.iter().filter(|t| terms.contains(*t)).count();
        if overlap > 0 && best.map_or(true, |(_, b)| overlap > b) {
            best = Some((sentence, overlap));
        }
    }

    best.map(|(sentence, _)| sentence.to_string())
}
