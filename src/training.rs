// 🏋️ Training Pipeline - labeled examples in, published model out
//
// examples → eligibility filter → k-fold accuracy → fit + train → persist → publish
//
// Only one run may be in flight. A run that fails or is cancelled never
// publishes, so the previously active model stays in place.

use crate::artifact::stage_model;
use crate::classifier::{eligible_categories, predict, train, ClassifierModel, MIN_CATEGORIES};
use crate::config::{ClassifierConfig, FeatureConfig, TrainingConfig};
use crate::error::{CategorizerError, Result};
use crate::features::{fit, transform_with, SparseVector};
use crate::registry::ModelRegistry;
use crate::seed;
use crate::types::{CancellationToken, CategoryId, RetrainReport, TrainingExample};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

// ============================================================================
// EXAMPLE SOURCE
// ============================================================================

/// Anything that can hand over labeled examples: the transaction store, a
/// CSV corpus, or a plain vector in tests.
pub trait ExampleSource {
    /// Every example whose category is known, optionally only those
    /// recorded at or before `as_of`
    fn labeled_examples(&self, as_of: Option<DateTime<Utc>>) -> anyhow::Result<Vec<TrainingExample>>;
}

/// In-memory examples carry no label timestamps, so an `as_of` cutoff
/// cannot be honored and is refused.
impl ExampleSource for [TrainingExample] {
    fn labeled_examples(&self, as_of: Option<DateTime<Utc>>) -> anyhow::Result<Vec<TrainingExample>> {
        if let Some(as_of) = as_of {
            anyhow::bail!("examples without label timestamps cannot be filtered as of {}", as_of);
        }
        Ok(self.to_vec())
    }
}

impl ExampleSource for Vec<TrainingExample> {
    fn labeled_examples(&self, as_of: Option<DateTime<Utc>>) -> anyhow::Result<Vec<TrainingExample>> {
        self.as_slice().labeled_examples(as_of)
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Resets the in-flight flag however the run ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A trained model that has not been published yet
pub struct TrainedModel {
    pub model: ClassifierModel,
    pub excluded: Vec<CategoryId>,
}

pub struct TrainingPipeline {
    features: FeatureConfig,
    classifier: ClassifierConfig,
    training: TrainingConfig,
    running: AtomicBool,
}

impl TrainingPipeline {
    pub fn new(features: FeatureConfig, classifier: ClassifierConfig, training: TrainingConfig) -> Self {
        TrainingPipeline {
            features,
            classifier,
            training,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                warn!("retrain requested while another run is in progress");
                CategorizerError::RetrainInProgress
            })?;
        Ok(RunGuard(&self.running))
    }

    /// Pull examples from `source`, train, and publish to `registry`.
    pub fn retrain(
        &self,
        source: &dyn ExampleSource,
        as_of: Option<DateTime<Utc>>,
        registry: &ModelRegistry,
        cancel: &CancellationToken,
    ) -> Result<RetrainReport> {
        let _guard = self.begin()?;

        let mut examples = if self.training.include_seed_examples {
            seed::default_examples()
        } else {
            Vec::new()
        };
        examples.extend(
            source
                .labeled_examples(as_of)
                .map_err(CategorizerError::Source)?,
        );
        debug!(examples = examples.len(), ?as_of, "training corpus assembled");

        let TrainedModel { model, excluded } = self.build(&examples, cancel)?;

        if let Some(minimum) = self.training.min_accuracy {
            match model.accuracy() {
                Some(accuracy) if accuracy < minimum => {
                    return Err(CategorizerError::AccuracyBelowMinimum { accuracy, minimum });
                }
                Some(_) => {}
                None => return Err(CategorizerError::AccuracyUnavailable { minimum }),
            }
        }

        let report = RetrainReport {
            model_version: model.version().to_string(),
            fingerprint: model.fingerprint().to_string(),
            trained_at: model.trained_at(),
            accuracy: model.accuracy(),
            examples_used: model.training_size(),
            categories: model.categories(),
            excluded_categories: excluded,
        };

        self.persist_and_publish(model, registry, cancel)?;

        info!(
            version = %report.model_version,
            accuracy = ?report.accuracy,
            examples = report.examples_used,
            categories = report.categories.len(),
            "model published"
        );
        Ok(report)
    }

    /// Stage the artifact, then commit and publish unless cancelled.
    /// A cancelled run leaves neither a file nor a new active model.
    fn persist_and_publish(
        &self,
        model: ClassifierModel,
        registry: &ModelRegistry,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(CategorizerError::Cancelled);
        }

        let staged = match &self.training.model_path {
            Some(path) => Some(stage_model(&model, path)?),
            None => None,
        };

        if cancel.is_cancelled() {
            return Err(CategorizerError::Cancelled);
        }

        if let Some(staged) = staged {
            staged.commit()?;
        }
        registry.publish(model);
        Ok(())
    }

    /// Train a model from `examples` without publishing it.
    ///
    /// Categories below the per-category minimum are dropped; fewer than two
    /// remaining categories is `DataInsufficient`.
    pub fn build(&self, examples: &[TrainingExample], cancel: &CancellationToken) -> Result<TrainedModel> {
        let usable: Vec<&TrainingExample> = examples
            .iter()
            .filter(|e| !e.description.trim().is_empty())
            .collect();

        let labels: Vec<CategoryId> = usable.iter().map(|e| e.category.clone()).collect();
        let (eligible, excluded) =
            eligible_categories(&labels, self.classifier.min_examples_per_category);

        if eligible.len() < MIN_CATEGORIES {
            return Err(CategorizerError::DataInsufficient {
                eligible: eligible.len(),
                required: MIN_CATEGORIES,
                excluded,
            });
        }

        if !excluded.is_empty() {
            info!(
                excluded = ?excluded,
                minimum = self.classifier.min_examples_per_category,
                "categories left to the rule matcher until more examples exist"
            );
        }

        let eligible: HashSet<&CategoryId> = eligible.iter().collect();
        let corpus: Vec<&TrainingExample> = usable
            .into_iter()
            .filter(|e| eligible.contains(&e.category))
            .collect();

        let accuracy = self.cross_validate(&corpus, cancel)?;
        let model = self.fit_and_train(&corpus, cancel)?.with_accuracy(accuracy);

        Ok(TrainedModel { model, excluded })
    }

    fn fit_and_train(
        &self,
        corpus: &[&TrainingExample],
        cancel: &CancellationToken,
    ) -> Result<ClassifierModel> {
        let descriptions: Vec<&str> = corpus.iter().map(|e| e.description.as_str()).collect();
        let labels: Vec<CategoryId> = corpus.iter().map(|e| e.category.clone()).collect();

        let vocabulary = fit(&descriptions, &self.features);
        let tokenizer = vocabulary.tokenizer();
        let vectors: Vec<SparseVector> = descriptions
            .iter()
            .map(|d| transform_with(&tokenizer, d, &vocabulary))
            .collect();

        train(vocabulary, &vectors, &labels, &self.classifier, cancel)
    }

    /// Held-out accuracy over k folds of a seeded shuffle.
    ///
    /// Folds whose training part has fewer than two categories are skipped;
    /// `None` when no fold could be evaluated.
    fn cross_validate(
        &self,
        corpus: &[&TrainingExample],
        cancel: &CancellationToken,
    ) -> Result<Option<f64>> {
        let folds = self.training.cv_folds.min(corpus.len());
        if folds < 2 {
            return Ok(None);
        }

        let mut order: Vec<usize> = (0..corpus.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.training.seed);
        order.shuffle(&mut rng);

        let mut correct = 0usize;
        let mut evaluated = 0usize;

        for fold in 0..folds {
            if cancel.is_cancelled() {
                return Err(CategorizerError::Cancelled);
            }

            let mut train_part = Vec::new();
            let mut test_part = Vec::new();
            for (position, &index) in order.iter().enumerate() {
                if position % folds == fold {
                    test_part.push(corpus[index]);
                } else {
                    train_part.push(corpus[index]);
                }
            }

            let model = match self.fit_and_train(&train_part, cancel) {
                Ok(model) => model,
                Err(CategorizerError::DataInsufficient { .. }) => {
                    debug!(fold, "fold skipped: too few categories");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let tokenizer = model.vocabulary().tokenizer();
            for example in test_part {
                let vector = transform_with(&tokenizer, &example.description, model.vocabulary());
                let distribution = predict(&vector, &model);
                if distribution.top().map(|(c, _)| c) == Some(&example.category) {
                    correct += 1;
                }
                evaluated += 1;
            }
        }

        if evaluated == 0 {
            return Ok(None);
        }
        Ok(Some(correct as f64 / evaluated as f64))
    }
}

// ============================================================================
// TESTS
// ============================================================================
