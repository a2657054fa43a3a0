// 🔤 Feature Extractor - TF-IDF over a frozen vocabulary
//
// fit(corpus) -> FeatureVocabulary
// transform(description, vocabulary) -> SparseVector
//
// Both are pure. A description made only of unknown tokens maps to the empty
// (zero) vector.

use crate::config::FeatureConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has",
    "have", "he", "her", "his", "how", "if", "in", "into", "is", "it", "its", "me", "my", "no",
    "not", "of", "off", "on", "or", "our", "out", "over", "she", "so", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "too", "up", "us", "very",
    "was", "we", "were", "what", "when", "where", "which", "who", "will", "with", "would",
    "you", "your",
];

// ============================================================================
// TOKENIZER
// ============================================================================

/// Turns a description into the token/n-gram sequence used as features
#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_token_len: usize,
    strip_digits: bool,
    ngram_max: usize,
    stem: bool,
    stop_words: HashSet<String>,
}

impl Tokenizer {
    pub fn new(config: &FeatureConfig) -> Self {
        let mut stop_words: HashSet<String> = match &config.stop_words {
            Some(words) => words.iter().map(|w| w.to_lowercase()).collect(),
            None => DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        };
        stop_words.extend(config.extra_stop_words.iter().map(|w| w.to_lowercase()));

        Tokenizer {
            min_token_len: config.min_token_len,
            strip_digits: config.strip_digits,
            ngram_max: config.ngram_max.max(1),
            stem: config.stem,
            stop_words,
        }
    }

    /// Lowercased single-word tokens after filtering
    pub fn words(&self, description: &str) -> Vec<String> {
        description
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= self.min_token_len)
            .filter(|w| !(self.strip_digits && w.chars().all(|c| c.is_ascii_digit())))
            .filter(|w| !self.stop_words.contains(*w))
            .map(|w| if self.stem { simple_stem(w) } else { w.to_string() })
            .collect()
    }

    /// Words plus contiguous n-grams up to `ngram_max`, joined by a space
    pub fn terms(&self, description: &str) -> Vec<String> {
        let words = self.words(description);
        let mut terms = words.clone();

        for n in 2..=self.ngram_max {
            if words.len() < n {
                break;
            }
            terms.extend(words.windows(n).map(|w| w.join(" ")));
        }

        terms
    }
}

/// Plural and verb-ending reduction: groceries -> grocery, stocks -> stock
pub fn simple_stem(word: &str) -> String {
    let len = word.chars().count();
    if len <= 2 || !word.is_ascii() {
        return word.to_string();
    }

    if word.ends_with("ies") && len > 4 {
        format!("{}y", &word[..len - 3])
    } else if word.ends_with("es") && len > 3 && !word.ends_with("ses") {
        word[..len - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") {
        word[..len - 1].to_string()
    } else if word.ends_with("ing") && len > 4 {
        word[..len - 3].to_string()
    } else if word.ends_with("ed") && len > 3 {
        word[..len - 2].to_string()
    } else {
        word.to_string()
    }
}

// ============================================================================
// SPARSE VECTOR
// ============================================================================

/// (column, value) pairs sorted by column, zeros omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn from_entries(mut entries: Vec<(usize, f64)>) -> Self {
        entries.retain(|(_, v)| *v != 0.0);
        entries.sort_by_key(|(i, _)| *i);
        SparseVector { entries }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// True for the zero vector (no known tokens)
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|(i, v)| dense.get(*i).map(|w| w * v))
            .sum()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }
}

// ============================================================================
// FEATURE VOCABULARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStats {
    pub index: usize,
    pub idf: f64,
}

/// Token -> (column, idf). Built once per training run, immutable afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVocabulary {
    terms: BTreeMap<String, TermStats>,
    /// Number of documents the IDF weights were computed from
    document_count: usize,
    config: FeatureConfig,
}

impl FeatureVocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn get(&self, term: &str) -> Option<&TermStats> {
        self.terms.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Terms in column order
    pub fn terms(&self) -> impl Iterator<Item = (&String, &TermStats)> {
        self.terms.iter()
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(&self.config)
    }
}

/// Learn vocabulary and IDF weights from a corpus
pub fn fit<S: AsRef<str>>(corpus: &[S], config: &FeatureConfig) -> FeatureVocabulary {
    let tokenizer = Tokenizer::new(config);

    let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_frequency: BTreeMap<String, usize> = BTreeMap::new();

    for description in corpus {
        let terms = tokenizer.terms(description.as_ref());
        let unique: BTreeSet<&String> = terms.iter().collect();
        for term in unique {
            *document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        for term in terms {
            *total_frequency.entry(term).or_insert(0) += 1;
        }
    }

    // Keep the most frequent terms; ties resolved alphabetically
    let mut ranked: Vec<(String, usize)> = total_frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(config.max_features);

    let kept: BTreeSet<String> = ranked.into_iter().map(|(t, _)| t).collect();

    let n = corpus.len() as f64;
    let terms = kept
        .into_iter()
        .enumerate()
        .map(|(index, term)| {
            let df = document_frequency.get(&term).copied().unwrap_or(0) as f64;
            // Smoothed IDF: ln((1 + n) / (1 + df)) + 1
            let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
            (term, TermStats { index, idf })
        })
        .collect();

    FeatureVocabulary {
        terms,
        document_count: corpus.len(),
        config: config.clone(),
    }
}

/// Map a description onto the vocabulary's columns
pub fn transform(description: &str, vocabulary: &FeatureVocabulary) -> SparseVector {
    transform_with(&vocabulary.tokenizer(), description, vocabulary)
}

/// Same as `transform`, reusing an already-built tokenizer
pub fn transform_with(
    tokenizer: &Tokenizer,
    description: &str,
    vocabulary: &FeatureVocabulary,
) -> SparseVector {
    let mut counts: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
    for term in tokenizer.terms(description) {
        if let Some(stats) = vocabulary.get(&term) {
            counts.entry(stats.index).or_insert((0.0, stats.idf)).0 += 1.0;
        }
    }

    let mut entries: Vec<(usize, f64)> = counts
        .into_iter()
        .map(|(index, (tf, idf))| (index, tf * idf))
        .collect();

    if vocabulary.config.normalize {
        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in entries.iter_mut() {
                *v /= norm;
            }
        }
    }

    SparseVector::from_entries(entries)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unigram_config() -> FeatureConfig {
        FeatureConfig {
            ngram_max: 1,
            ..FeatureConfig::default()
        }
    }

    #[test]
    fn test_tokenizer_filters_noise() {
        let tokenizer = Tokenizer::new(&FeatureConfig::default());
        let words = tokenizer.words("STARBUCKS #4521 - Coffee for the team, x");

        assert_eq!(words, vec!["starbucks", "coffee", "team"]);
    }

    #[test]
    fn test_tokenizer_keeps_alphanumeric_tokens() {
        let tokenizer = Tokenizer::new(&FeatureConfig::default());
        assert_eq!(tokenizer.words("401k contribution"), vec!["401k", "contribution"]);

        let keep_digits = FeatureConfig {
            strip_digits: false,
            ..FeatureConfig::default()
        };
        let tokenizer = Tokenizer::new(&keep_digits);
        assert_eq!(tokenizer.words("Store 12"), vec!["store", "12"]);
    }

    #[test]
    fn test_tokenizer_ngrams() {
        let tokenizer = Tokenizer::new(&FeatureConfig::default());
        let terms = tokenizer.terms("Shell Gas Station");

        assert_eq!(
            terms,
            vec!["shell", "gas", "station", "shell gas", "gas station"]
        );
    }

    #[test]
    fn test_custom_stop_words() {
        let config = FeatureConfig {
            extra_stop_words: vec!["POS".to_string(), "purchase".to_string()],
            ..unigram_config()
        };
        let tokenizer = Tokenizer::new(&config);
        assert_eq!(tokenizer.words("POS purchase Amazon"), vec!["amazon"]);
    }

    #[test]
    fn test_simple_stem() {
        assert_eq!(simple_stem("groceries"), "grocery");
        assert_eq!(simple_stem("boxes"), "box");
        assert_eq!(simple_stem("stocks"), "stock");
        assert_eq!(simple_stem("class"), "class");
        assert_eq!(simple_stem("buying"), "buy");
        assert_eq!(simple_stem("purchased"), "purchas");
        assert_eq!(simple_stem("go"), "go");
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary_with_idf() {
        let corpus = ["Starbucks Coffee", "Coffee Bean", "Shell Gas"];
        let vocabulary = fit(&corpus, &unigram_config());

        let terms: Vec<&String> = vocabulary.terms().map(|(t, _)| t).collect();
        assert_eq!(terms, vec!["bean", "coffee", "gas", "shell", "starbucks"]);

        let coffee = vocabulary.get("coffee").unwrap();
        let starbucks = vocabulary.get("starbucks").unwrap();
        assert_eq!(coffee.index, 1);
        // Shared terms carry less weight than rare ones
        assert!(coffee.idf < starbucks.idf);
        assert!((starbucks.idf - ((4.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
        assert_eq!(vocabulary.document_count(), 3);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let corpus = ["coffee coffee latte", "coffee tea", "tea juice"];
        let config = FeatureConfig {
            max_features: 2,
            ..unigram_config()
        };
        let vocabulary = fit(&corpus, &config);

        assert_eq!(vocabulary.len(), 2);
        assert!(vocabulary.contains("coffee"));
        assert!(vocabulary.contains("tea"));
        assert!(!vocabulary.contains("latte"));
    }

    #[test]
    fn test_transform_is_normalized() {
        let corpus = ["Starbucks Coffee", "Shell Gas Station"];
        let vocabulary = fit(&corpus, &FeatureConfig::default());

        let vector = transform("Starbucks coffee", &vocabulary);
        assert_eq!(vector.nnz(), 3);
        assert!((vector.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_out_of_vocabulary_is_zero() {
        let corpus = ["Starbucks Coffee", "Shell Gas Station"];
        let vocabulary = fit(&corpus, &FeatureConfig::default());

        let vector = transform("Acme Unknown Merchant", &vocabulary);
        assert!(vector.is_zero());
        assert_eq!(vector.norm(), 0.0);

        assert!(transform("", &vocabulary).is_zero());
    }

    #[test]
    fn test_transform_term_frequency() {
        let corpus = ["uber uber trip", "lyft ride"];
        let config = FeatureConfig {
            normalize: false,
            ..unigram_config()
        };
        let vocabulary = fit(&corpus, &config);

        let vector = transform("uber uber", &vocabulary);
        let uber = vocabulary.get("uber").unwrap();
        assert_eq!(vector.entries(), &[(uber.index, 2.0 * uber.idf)]);
    }
}
