// 📈 Statistical Classifier - multinomial logistic regression
//
// train(vectors, labels) -> ClassifierModel
// predict(vector, model) -> CategoryDistribution
//
// Training is full-batch AdamW from zero weights, so identical input
// ordering and hyperparameters give identical weights.

use crate::config::ClassifierConfig;
use crate::error::{CategorizerError, Result};
use crate::features::{FeatureVocabulary, SparseVector};
use crate::types::{CancellationToken, CategoryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

/// A model needs at least this many categories to discriminate anything
pub const MIN_CATEGORIES: usize = 2;

// ============================================================================
// MODEL
// ============================================================================

/// Linear scores for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub category: CategoryId,
    pub bias: f64,
    /// Dense, one coefficient per vocabulary column
    pub coefficients: Vec<f64>,
}

/// One immutable trained artifact. Nothing mutates a model after it is built;
/// a new training run produces a new model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierModel {
    version: String,
    trained_at: DateTime<Utc>,
    vocabulary: FeatureVocabulary,
    weights: Vec<CategoryWeights>,
    training_size: usize,
    accuracy: Option<f64>,
    /// SHA-256 over vocabulary and weights
    fingerprint: String,
}

impl ClassifierModel {
    /// Assemble a model from trained parts
    pub fn from_parts(
        vocabulary: FeatureVocabulary,
        weights: Vec<CategoryWeights>,
        training_size: usize,
        accuracy: Option<f64>,
    ) -> Result<Self> {
        let fingerprint = compute_fingerprint(&vocabulary, &weights)?;
        Ok(ClassifierModel {
            version: uuid::Uuid::new_v4().to_string(),
            trained_at: Utc::now(),
            vocabulary,
            weights,
            training_size,
            accuracy,
            fingerprint,
        })
    }

    /// Attach the held-out accuracy estimate (not part of the fingerprint)
    pub fn with_accuracy(mut self, accuracy: Option<f64>) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn vocabulary(&self) -> &FeatureVocabulary {
        &self.vocabulary
    }

    pub fn weights(&self) -> &[CategoryWeights] {
        &self.weights
    }

    pub fn training_size(&self) -> usize {
        self.training_size
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn categories(&self) -> Vec<CategoryId> {
        self.weights.iter().map(|w| w.category.clone()).collect()
    }

    /// Recompute the fingerprint and compare with the stored one
    pub fn verify_fingerprint(&self) -> Result<bool> {
        Ok(compute_fingerprint(&self.vocabulary, &self.weights)? == self.fingerprint)
    }

    /// Same vocabulary and weights (version and timestamps ignored)
    pub fn is_equivalent(&self, other: &ClassifierModel) -> bool {
        self.fingerprint == other.fingerprint
    }
}

fn compute_fingerprint(vocabulary: &FeatureVocabulary, weights: &[CategoryWeights]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(vocabulary)?);
    hasher.update(serde_json::to_vec(weights)?);
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Normalized probability per category, in model order
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDistribution {
    probabilities: Vec<(CategoryId, f64)>,
}

impl CategoryDistribution {
    pub fn probabilities(&self) -> &[(CategoryId, f64)] {
        &self.probabilities
    }

    pub fn probability(&self, category: &CategoryId) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, p)| *p)
    }

    /// Highest-probability category; ties go to the earlier category
    pub fn top(&self) -> Option<(&CategoryId, f64)> {
        self.top_where(|_| true)
    }

    /// Highest-probability category among those accepted by `allowed`
    pub fn top_where<F>(&self, allowed: F) -> Option<(&CategoryId, f64)>
    where
        F: Fn(&CategoryId) -> bool,
    {
        let mut best: Option<(&CategoryId, f64)> = None;
        for (category, p) in &self.probabilities {
            if !allowed(category) {
                continue;
            }
            match best {
                Some((_, best_p)) if *p <= best_p => {}
                _ => best = Some((category, *p)),
            }
        }
        best
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn logits(weights: &[CategoryWeights], vector: &SparseVector) -> Vec<f64> {
    weights
        .iter()
        .map(|w| w.bias + vector.dot(&w.coefficients))
        .collect()
}

/// Probability distribution over the model's categories
pub fn predict(vector: &SparseVector, model: &ClassifierModel) -> CategoryDistribution {
    let probabilities = softmax(&logits(&model.weights, vector));
    CategoryDistribution {
        probabilities: model
            .weights
            .iter()
            .map(|w| w.category.clone())
            .zip(probabilities)
            .collect(),
    }
}

// ============================================================================
// TRAINING
// ============================================================================

/// Split label counts into categories with enough examples and the rest.
/// Both lists are sorted.
pub fn eligible_categories(
    labels: &[CategoryId],
    min_examples: usize,
) -> (Vec<CategoryId>, Vec<CategoryId>) {
    let mut counts: BTreeMap<&CategoryId, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut eligible = Vec::new();
    let mut excluded = Vec::new();
    for (category, count) in counts {
        if count >= min_examples.max(1) {
            eligible.push(category.clone());
        } else {
            excluded.push(category.clone());
        }
    }
    (eligible, excluded)
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// First and second moment estimates for one parameter block
struct Moments {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Moments {
    fn new(len: usize) -> Self {
        Moments {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    /// AdamW step: adaptive update plus decoupled decay `decay * param`
    fn step(&mut self, params: &mut [f64], grads: &[f64], lr_t: f64, decay: f64) {
        let moments = self.m.iter_mut().zip(self.v.iter_mut());
        for ((param, g), (m, v)) in params.iter_mut().zip(grads).zip(moments) {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *param -= lr_t * *m / (v.sqrt() + EPSILON) + decay * *param;
        }
    }
}

/// Fit one weight vector per category. Categories are ordered by id.
///
/// Full-batch AdamW from zero weights; stops after `epochs` passes or once
/// the mean cross-entropy stops moving by more than `tolerance`.
pub fn train(
    vocabulary: FeatureVocabulary,
    vectors: &[SparseVector],
    labels: &[CategoryId],
    config: &ClassifierConfig,
    cancel: &CancellationToken,
) -> Result<ClassifierModel> {
    let categories: Vec<CategoryId> = {
        let mut distinct: Vec<CategoryId> = labels.to_vec();
        distinct.sort();
        distinct.dedup();
        distinct
    };

    if categories.len() < MIN_CATEGORIES || vectors.len() != labels.len() {
        return Err(CategorizerError::DataInsufficient {
            eligible: categories.len(),
            required: MIN_CATEGORIES,
            excluded: Vec::new(),
        });
    }

    let index: BTreeMap<&CategoryId, usize> =
        categories.iter().enumerate().map(|(i, c)| (c, i)).collect();
    let targets: Vec<usize> = labels.iter().map(|l| index[l]).collect();

    let k = categories.len();
    let d = vocabulary.len();
    let n = vectors.len() as f64;
    let lr = config.learning_rate;

    let mut biases = vec![0.0; k];
    let mut coefficients = vec![vec![0.0; d]; k];
    let mut bias_moments = Moments::new(k);
    let mut coefficient_moments: Vec<Moments> = (0..k).map(|_| Moments::new(d)).collect();

    let mut grad_w = vec![vec![0.0; d]; k];
    let mut grad_b = vec![0.0; k];
    let mut previous_loss = f64::INFINITY;

    for epoch in 0..config.epochs {
        if cancel.is_cancelled() {
            return Err(CategorizerError::Cancelled);
        }

        for row in grad_w.iter_mut() {
            row.fill(0.0);
        }
        grad_b.fill(0.0);

        let mut loss = 0.0;
        for (vector, &target) in vectors.iter().zip(&targets) {
            let scores: Vec<f64> = biases
                .iter()
                .zip(&coefficients)
                .map(|(b, w)| b + vector.dot(w))
                .collect();
            let probabilities = softmax(&scores);
            loss -= probabilities[target].max(f64::MIN_POSITIVE).ln();

            for (c, p) in probabilities.iter().enumerate() {
                let g = (p - if c == target { 1.0 } else { 0.0 }) / n;
                grad_b[c] += g;
                for &(j, v) in vector.entries() {
                    grad_w[c][j] += g * v;
                }
            }
        }
        loss /= n;

        if (previous_loss - loss).abs() < config.tolerance {
            debug!(epoch, loss, "training converged");
            break;
        }
        previous_loss = loss;

        let t = (epoch + 1) as i32;
        let lr_t = lr * (1.0 - BETA2.powi(t)).sqrt() / (1.0 - BETA1.powi(t));

        bias_moments.step(&mut biases, &grad_b, lr_t, 0.0);
        for ((w, g), moments) in coefficients.iter_mut().zip(&grad_w).zip(coefficient_moments.iter_mut()) {
            moments.step(w, g, lr_t, lr * config.l2);
        }
    }

    let weights = categories
        .into_iter()
        .zip(biases)
        .zip(coefficients)
        .map(|((category, bias), coefficients)| CategoryWeights {
            category,
            bias,
            coefficients,
        })
        .collect();

    ClassifierModel::from_parts(vocabulary, weights, vectors.len(), None)
}

// ============================================================================
// TESTS
// ============================================================================
