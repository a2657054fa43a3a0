// 🗂️ Model Registry - the one active model
//
// Readers take an Arc snapshot and keep it for a whole prediction.
// `publish` swaps the Arc; a published model is never mutated.

use crate::artifact::load_model;
use crate::classifier::ClassifierModel;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

#[derive(Default)]
pub struct ModelRegistry {
    active: RwLock<Option<Arc<ClassifierModel>>>,
    rule_only_logged: AtomicBool,
}

impl ModelRegistry {
    /// Empty registry (rule-only mode)
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry restored from a persisted artifact.
    ///
    /// A missing file means training has never run. Any other load failure
    /// is reported and the registry starts empty.
    pub fn restore(path: &Path) -> Self {
        let registry = ModelRegistry::new();
        if !path.exists() {
            info!(path = %path.display(), "no persisted model, starting in rule-only mode");
            return registry;
        }

        match load_model(path) {
            Ok(model) => {
                info!(
                    version = model.version(),
                    trained_at = %model.trained_at(),
                    examples = model.training_size(),
                    "restored persisted model"
                );
                registry.publish(model);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "persisted model rejected, starting in rule-only mode");
            }
        }
        registry
    }

    /// Snapshot of the active model, `None` when nothing has been published.
    pub fn get_active(&self) -> Option<Arc<ClassifierModel>> {
        let snapshot = self
            .active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        if snapshot.is_none() && !self.rule_only_logged.swap(true, Ordering::Relaxed) {
            info!("no classifier model published yet, using rules only");
        }
        snapshot
    }

    /// Make `model` the active one; returns the model it replaced.
    pub fn publish(&self, model: ClassifierModel) -> Option<Arc<ClassifierModel>> {
        let model = Arc::new(model);
        let mut guard = self.active.write().unwrap_or_else(|e| e.into_inner());
        guard.replace(model)
    }

    pub fn has_model(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn active_version(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|m| m.version().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::save_model;
    use crate::classifier::CategoryWeights;
    use crate::config::FeatureConfig;
    use crate::features::fit;
    use crate::types::CategoryId;

    fn model(bias: f64) -> ClassifierModel {
        let vocabulary = fit(&["coffee"], &FeatureConfig::default());
        let weights = ["dining", "shopping"]
            .iter()
            .map(|c| CategoryWeights {
                category: CategoryId::from(*c),
                bias,
                coefficients: vec![0.0],
            })
            .collect();
        ClassifierModel::from_parts(vocabulary, weights, 2, None).unwrap()
    }

    #[test]
    fn test_empty_registry_is_rule_only() {
        let registry = ModelRegistry::new();
        assert!(registry.get_active().is_none());
        assert!(registry.get_active().is_none());
        assert!(!registry.has_model());
        assert!(registry.active_version().is_none());
    }

    #[test]
    fn test_publish_swaps_without_touching_snapshots() {
        let registry = ModelRegistry::new();
        let first = model(0.0);
        let first_version = first.version().to_string();
        assert!(registry.publish(first).is_none());

        let snapshot = registry.get_active().unwrap();

        let replaced = registry.publish(model(1.0)).unwrap();
        assert_eq!(replaced.version(), first_version);

        // The reader's snapshot is still the complete old model
        assert_eq!(snapshot.version(), first_version);
        assert_eq!(snapshot.weights()[0].bias, 0.0);
        assert_eq!(registry.get_active().unwrap().weights()[0].bias, 1.0);
    }

    #[test]
    fn test_restore_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        assert!(!ModelRegistry::restore(&path).has_model());

        let saved = model(0.25);
        save_model(&saved, &path).unwrap();
        let registry = ModelRegistry::restore(&path);
        assert_eq!(registry.active_version().as_deref(), Some(saved.version()));

        std::fs::write(&path, b"corrupted").unwrap();
        let registry = ModelRegistry::restore(&path);
        assert!(!registry.has_model());

        println!("✅ Registry restore test PASSED");
    }
}
