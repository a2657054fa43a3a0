// Spend Categorizer - Core Library
// Exposes all modules for use in the CLI, hosting services, and tests

pub mod types;
pub mod error;
pub mod config;
pub mod features;      // TF-IDF feature extraction
pub mod rules;         // Merchant/keyword rule matcher
pub mod classifier;    // Softmax regression model
pub mod gate;          // Rules + classifier → one decision
pub mod artifact;      // Model persistence
pub mod registry;      // Active model holder
pub mod seed;          // Built-in labeled corpus
pub mod training;      // Retraining pipeline
pub mod engine;        // Categorizer facade
pub mod entities;      // Category catalogue
pub mod store;         // SQLite transaction store
pub mod ingest;        // CSV upload and bulk categorization

// Re-export commonly used types
pub use types::{
    CancellationToken, CategoryId, PredictionResult, RetrainReport, Strategy,
    TrainingExample, UserId,
};
pub use error::{CategorizerError, Result};
pub use config::{
    ClassifierConfig, EngineConfig, FeatureConfig, GateConfig, Precedence,
    RulesConfig, TrainingConfig,
};
pub use features::{fit, transform, FeatureVocabulary, SparseVector};
pub use rules::{MatchRule, RuleMatch, RuleMatcher};
pub use classifier::{predict, train, CategoryDistribution, ClassifierModel};
pub use gate::ConfidenceGate;
pub use artifact::{load_model, save_model, stage_model, StagedArtifact};
pub use registry::ModelRegistry;
pub use training::{ExampleSource, TrainingPipeline};
pub use engine::Categorizer;
pub use entities::{Category, CategoryKind, CategoryRegistry};
pub use store::{
    Event, Transaction,
    setup_database, insert_transaction, apply_prediction, record_correction,
    uncategorized_for_user, labeled_examples, get_transaction,
    insert_user_category, load_user_categories, insert_event, get_events_for_entity,
};
pub use ingest::{bulk_categorize, import_csv, load_corpus, BulkSummary, ImportSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
