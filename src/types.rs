// 🧾 Core Types - identifiers, labeled examples and prediction results
//
// Category identity is opaque to the engine: it is a string handed in by the
// hosting application and handed back unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Opaque category identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        CategoryId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(id: &str) -> Self {
        CategoryId(id.to_string())
    }
}

/// Owning user of transactions, rules and user-defined categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TRAINING EXAMPLE
// ============================================================================

/// A labeled description. Corrections made by users are ordinary examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub description: String,
    pub category: CategoryId,
}

impl TrainingExample {
    pub fn new(description: impl Into<String>, category: impl Into<CategoryId>) -> Self {
        TrainingExample {
            description: description.into(),
            category: category.into(),
        }
    }
}

impl From<String> for CategoryId {
    fn from(id: String) -> Self {
        CategoryId(id)
    }
}

// ============================================================================
// PREDICTION RESULT
// ============================================================================

/// Which path produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Classifier,
    Rule,
    None,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Classifier => "classifier",
            Strategy::Rule => "rule",
            Strategy::None => "none",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `categorize` call. Never stored by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub category: Option<CategoryId>,
    /// Always within [0, 1]
    pub confidence: f64,
    pub strategy: Strategy,
}

impl PredictionResult {
    /// Leave the transaction uncategorized
    pub fn none(confidence: f64) -> Self {
        PredictionResult {
            category: None,
            confidence: confidence.clamp(0.0, 1.0),
            strategy: Strategy::None,
        }
    }

    pub fn assigned(category: CategoryId, confidence: f64, strategy: Strategy) -> Self {
        PredictionResult {
            category: Some(category),
            confidence: confidence.clamp(0.0, 1.0),
            strategy,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.category.is_some()
    }
}

// ============================================================================
// RETRAIN REPORT
// ============================================================================

/// What a successful training run published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainReport {
    pub model_version: String,
    pub fingerprint: String,
    pub trained_at: DateTime<Utc>,
    pub accuracy: Option<f64>,
    pub examples_used: usize,
    pub categories: Vec<CategoryId>,
    pub excluded_categories: Vec<CategoryId>,
}

impl RetrainReport {
    pub fn summary(&self) -> String {
        let accuracy = match self.accuracy {
            Some(a) => format!("{:.1}%", a * 100.0),
            None => "n/a".to_string(),
        };
        format!(
            "Model {} trained on {} examples, {} categories ({} excluded), accuracy {}",
            self.model_version,
            self.examples_used,
            self.categories.len(),
            self.excluded_categories.len(),
            accuracy
        )
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Shared flag an external scheduler flips to abandon a training run.
/// Cancelling only means the run never publishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_confidence_is_clamped() {
        let result = PredictionResult::assigned(CategoryId::from("dining"), 1.2, Strategy::Rule);
        assert_eq!(result.confidence, 1.0);

        let none = PredictionResult::none(-0.3);
        assert_eq!(none.confidence, 0.0);
        assert_eq!(none.strategy, Strategy::None);
        assert!(!none.is_assigned());
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_strategy_serializes_snake_case() {
        let json = serde_json::to_string(&Strategy::Classifier).unwrap();
        assert_eq!(json, "\"classifier\"");
        assert_eq!(Strategy::None.to_string(), "none");
    }
}
