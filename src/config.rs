//! Engine configuration
//!
//! Every field has a default so a partial (or missing) TOML file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

// ============================================================================
// FEATURE EXTRACTION
// ============================================================================

/// Tokenization and TF-IDF settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Tokens shorter than this are discarded
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
    /// Drop tokens made only of digits (card numbers, store numbers)
    #[serde(default = "default_true")]
    pub strip_digits: bool,
    /// Largest n-gram size (1 = single words only)
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    /// Vocabulary cap, most frequent terms kept
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Scale each vector to unit L2 length
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// Reduce plurals and -ing/-ed endings to a common root
    #[serde(default)]
    pub stem: bool,
    /// Replaces the built-in English list when set
    #[serde(default)]
    pub stop_words: Option<Vec<String>>,
    /// Added on top of the active stop-word list
    #[serde(default)]
    pub extra_stop_words: Vec<String>,
}

fn default_min_token_len() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_ngram_max() -> usize {
    2
}

fn default_max_features() -> usize {
    1000
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_token_len: default_min_token_len(),
            strip_digits: true,
            ngram_max: default_ngram_max(),
            max_features: default_max_features(),
            normalize: true,
            stem: false,
            stop_words: None,
            extra_stop_words: Vec::new(),
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Softmax regression hyperparameters (AdamW optimizer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Upper bound on full-batch passes
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Decoupled weight decay on the coefficients (biases are not decayed)
    #[serde(default = "default_l2")]
    pub l2: f64,
    /// Stop once the mean training loss changes by less than this
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Categories with fewer labeled examples are left to the rule matcher
    #[serde(default = "default_min_examples")]
    pub min_examples_per_category: usize,
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> usize {
    300
}

fn default_l2() -> f64 {
    1e-4
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_min_examples() -> usize {
    2
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
            tolerance: default_tolerance(),
            min_examples_per_category: default_min_examples(),
        }
    }
}

// ============================================================================
// CONFIDENCE GATE
// ============================================================================

/// Which strategy is consulted first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    #[default]
    RulesFirst,
    ClassifierFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Classifier predictions at or above this confidence are assigned
    #[serde(default = "default_threshold")]
    pub auto_assign_threshold: f64,
    #[serde(default)]
    pub precedence: Precedence,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auto_assign_threshold: default_threshold(),
            precedence: Precedence::RulesFirst,
        }
    }
}

// ============================================================================
// TRAINING PIPELINE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Seed for the cross-validation shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_folds")]
    pub cv_folds: usize,
    /// Block publication below this accuracy (disabled when unset)
    #[serde(default)]
    pub min_accuracy: Option<f64>,
    /// Prepend the built-in seed corpus to the collaborator's examples
    #[serde(default = "default_true")]
    pub include_seed_examples: bool,
    /// Where the published model is persisted
    #[serde(default)]
    pub model_path: Option<std::path::PathBuf>,
}

fn default_seed() -> u64 {
    42
}

fn default_folds() -> usize {
    5
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            cv_folds: default_folds(),
            min_accuracy: None,
            include_seed_examples: true,
            model_path: None,
        }
    }
}

// ============================================================================
// RULES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Fixed confidence reported for any rule match
    #[serde(default = "default_rule_confidence")]
    pub confidence: f64,
    /// Load the built-in merchant/keyword table as system rules
    #[serde(default = "default_true")]
    pub use_defaults: bool,
    /// Extra system rules (JSON array of rules)
    #[serde(default)]
    pub system_rules_file: Option<std::path::PathBuf>,
}

fn default_rule_confidence() -> f64 {
    0.95
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            confidence: default_rule_confidence(),
            use_defaults: true,
            system_rules_file: None,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(EngineConfig::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: EngineConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }
}
