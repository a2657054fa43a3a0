// ⚙️ Categorization Engine - the two operations a host application calls
//
// categorize(description, user) → PredictionResult   (inline, never blocks on training)
// retrain(source, as_of, cancel) → RetrainReport     (batch, single-flight)

use crate::config::EngineConfig;
use crate::entities::category::CategoryRegistry;
use crate::error::Result;
use crate::gate::ConfidenceGate;
use crate::registry::ModelRegistry;
use crate::rules::{MatchRule, RuleMatcher};
use crate::training::{ExampleSource, TrainingPipeline};
use crate::types::{CancellationToken, PredictionResult, RetrainReport, UserId};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use tracing::debug;

pub struct Categorizer {
    config: EngineConfig,
    rules: RwLock<RuleMatcher>,
    categories: CategoryRegistry,
    models: ModelRegistry,
    pipeline: TrainingPipeline,
    gate: ConfidenceGate,
}

impl Categorizer {
    /// Build an engine from configuration: default and file-based system
    /// rules, system categories, and the persisted model if one exists.
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let mut rules = if config.rules.use_defaults {
            RuleMatcher::with_defaults(config.rules.confidence)
        } else {
            RuleMatcher::new(config.rules.confidence)
        };

        if let Some(path) = &config.rules.system_rules_file {
            let extra = RuleMatcher::load_rules(path)
                .with_context(|| format!("Failed to load system rules from {:?}", path))?;
            rules.extend_system(extra);
        }

        let models = match &config.training.model_path {
            Some(path) => ModelRegistry::restore(path),
            None => ModelRegistry::new(),
        };

        Ok(Self::with_parts(config, rules, CategoryRegistry::with_defaults(), models))
    }

    /// Assemble an engine from already-built parts
    pub fn with_parts(
        config: EngineConfig,
        rules: RuleMatcher,
        categories: CategoryRegistry,
        models: ModelRegistry,
    ) -> Self {
        let pipeline = TrainingPipeline::new(
            config.features.clone(),
            config.classifier.clone(),
            config.training.clone(),
        );
        let gate = ConfidenceGate::new(&config.gate);

        Categorizer {
            config,
            rules: RwLock::new(rules),
            categories,
            models,
            pipeline,
            gate,
        }
    }

    /// Categorize one description on behalf of `user` (`None` = system
    /// rules and system categories only).
    pub fn categorize(&self, description: &str, user: Option<UserId>) -> PredictionResult {
        let model = self.models.get_active();
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());

        let result = self.gate.categorize(description, user, &rules, model.as_deref(), |id| {
            self.categories.is_assignable(id, user)
        });

        debug!(
            description,
            category = ?result.category,
            confidence = result.confidence,
            strategy = %result.strategy,
            "categorized"
        );
        result
    }

    /// Retrain from `source` and publish on success. On any error the
    /// active model is unchanged.
    pub fn retrain(
        &self,
        source: &dyn ExampleSource,
        as_of: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<RetrainReport> {
        self.pipeline.retrain(source, as_of, &self.models, cancel)
    }

    pub fn add_user_rule(&self, user: UserId, rule: MatchRule) {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .add_user_rule(user, rule);
    }

    pub fn remove_user_rule(&self, user: UserId, rule_id: &str) -> bool {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove_user_rule(user, rule_id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn is_training(&self) -> bool {
        self.pipeline.is_running()
    }
}

// ============================================================================
// TESTS
// ============================================================================
