// 🚦 Confidence Gate - one decision from rules and classifier
//
// RulesFirst:      rule match → rule; else classifier ≥ threshold → classifier; else none
// ClassifierFirst: classifier ≥ threshold → classifier; else rule match → rule; else none

use crate::classifier::{predict, ClassifierModel};
use crate::config::{GateConfig, Precedence};
use crate::features::transform;
use crate::rules::{RuleMatch, RuleMatcher};
use crate::types::{CategoryId, PredictionResult, Strategy, UserId};
use tracing::debug;

/// Best classifier guess before thresholding
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub category: CategoryId,
    pub confidence: f64,
}

/// Assign when `confidence >= threshold`, otherwise leave uncategorized
/// while still reporting the computed confidence.
pub fn decide(candidate: Option<Candidate>, threshold: f64) -> PredictionResult {
    match candidate {
        Some(c) if c.confidence >= threshold => {
            PredictionResult::assigned(c.category, c.confidence, Strategy::Classifier)
        }
        Some(c) => PredictionResult::none(c.confidence),
        None => PredictionResult::none(0.0),
    }
}

/// Top classifier category among those `allowed`.
///
/// Returns `None` when no model is active or the description carries no
/// in-vocabulary terms (zero vector).
pub fn classifier_candidate<F>(
    description: &str,
    model: Option<&ClassifierModel>,
    allowed: F,
) -> Option<Candidate>
where
    F: Fn(&CategoryId) -> bool,
{
    let model = model?;
    let vector = transform(description, model.vocabulary());
    if vector.is_zero() {
        debug!(description, "no known terms, classifier skipped");
        return None;
    }

    let distribution = predict(&vector, model);
    distribution
        .top_where(allowed)
        .map(|(category, confidence)| Candidate {
            category: category.clone(),
            confidence,
        })
}

fn from_rule(rule: RuleMatch) -> Option<PredictionResult> {
    let category = rule.category?;
    Some(PredictionResult::assigned(category, rule.confidence, Strategy::Rule))
}

pub struct ConfidenceGate {
    threshold: f64,
    precedence: Precedence,
}

impl ConfidenceGate {
    pub fn new(config: &GateConfig) -> Self {
        ConfidenceGate {
            threshold: config.auto_assign_threshold.clamp(0.0, 1.0),
            precedence: config.precedence,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Categorize one description for `user`. Never fails; an empty
    /// description is always uncategorized with confidence 0.
    pub fn categorize<F>(
        &self,
        description: &str,
        user: Option<UserId>,
        rules: &RuleMatcher,
        model: Option<&ClassifierModel>,
        allowed: F,
    ) -> PredictionResult
    where
        F: Fn(&CategoryId) -> bool,
    {
        if description.trim().is_empty() {
            return PredictionResult::none(0.0);
        }

        match self.precedence {
            Precedence::RulesFirst => {
                if let Some(result) = from_rule(rules.classify(description, user)) {
                    return result;
                }
                decide(classifier_candidate(description, model, allowed), self.threshold)
            }
            Precedence::ClassifierFirst => {
                let decision =
                    decide(classifier_candidate(description, model, allowed), self.threshold);
                if decision.is_assigned() {
                    return decision;
                }
                from_rule(rules.classify(description, user)).unwrap_or(decision)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CategoryWeights;
    use crate::config::FeatureConfig;
    use crate::features::fit;
    use crate::rules::MatchRule;

    fn candidate(confidence: f64) -> Option<Candidate> {
        Some(Candidate {
            category: CategoryId::from("dining"),
            confidence,
        })
    }

    /// Two categories, all-zero weights: every in-vocabulary input scores exactly 0.5
    fn flat_model() -> ClassifierModel {
        let vocabulary = fit(&["coffee latte"], &FeatureConfig::default());
        let weights = ["dining", "shopping"]
            .iter()
            .map(|c| CategoryWeights {
                category: CategoryId::from(*c),
                bias: 0.0,
                coefficients: vec![0.0; vocabulary.len()],
            })
            .collect();
        ClassifierModel::from_parts(vocabulary, weights, 0, None).unwrap()
    }

    /// Model that strongly prefers "shopping" for "coffee"
    fn shopping_model() -> ClassifierModel {
        let vocabulary = fit(&["coffee"], &FeatureConfig::default());
        let weights = vec![
            CategoryWeights {
                category: CategoryId::from("dining"),
                bias: 0.0,
                coefficients: vec![0.0],
            },
            CategoryWeights {
                category: CategoryId::from("shopping"),
                bias: 0.0,
                coefficients: vec![5.0],
            },
        ];
        ClassifierModel::from_parts(vocabulary, weights, 0, None).unwrap()
    }

    #[test]
    fn test_threshold_boundary() {
        let at = decide(candidate(0.5), 0.5);
        assert_eq!(at.category, Some(CategoryId::from("dining")));
        assert_eq!(at.strategy, Strategy::Classifier);

        let just_below = f64::from_bits(0.5f64.to_bits() - 1);
        let below = decide(candidate(just_below), 0.5);
        assert_eq!(below.category, None);
        assert_eq!(below.strategy, Strategy::None);
        assert_eq!(below.confidence, just_below);

        println!("✅ Threshold boundary test PASSED");
    }

    #[test]
    fn test_flat_model_sits_on_threshold() {
        let gate = ConfidenceGate::new(&GateConfig::default());
        let rules = RuleMatcher::new(0.95);
        let model = flat_model();

        let result = gate.categorize("Coffee", None, &rules, Some(&model), |_| true);
        assert_eq!(result.category, Some(CategoryId::from("dining")));
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.strategy, Strategy::Classifier);

        let strict = ConfidenceGate::new(&GateConfig {
            auto_assign_threshold: 0.51,
            ..GateConfig::default()
        });
        let result = strict.categorize("Coffee", None, &rules, Some(&model), |_| true);
        assert_eq!(result.strategy, Strategy::None);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_empty_and_unknown_descriptions() {
        let gate = ConfidenceGate::new(&GateConfig::default());
        let rules = RuleMatcher::with_defaults(0.95);
        let model = flat_model();

        for description in ["", "   "] {
            let result = gate.categorize(description, Some(UserId(1)), &rules, Some(&model), |_| true);
            assert_eq!(result, PredictionResult::none(0.0));
        }

        let result = gate.categorize("Zzyzx Qwerty", None, &rules, Some(&model), |_| true);
        assert_eq!(result.strategy, Strategy::None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_rule_only_mode_without_model() {
        let gate = ConfidenceGate::new(&GateConfig::default());
        let mut rules = RuleMatcher::new(0.95);
        rules.add_system_rule(MatchRule::new("r1", "coffee", "dining"));

        let result = gate.categorize("Corner Coffee", None, &rules, None, |_| true);
        assert_eq!(result.strategy, Strategy::Rule);
        assert_eq!(result.confidence, 0.95);

        let result = gate.categorize("Bookstore", None, &rules, None, |_| true);
        assert_eq!(result.strategy, Strategy::None);
    }

    #[test]
    fn test_precedence_is_configurable() {
        let mut rules = RuleMatcher::new(0.95);
        rules.add_system_rule(MatchRule::new("r1", "coffee", "dining"));
        let model = shopping_model();

        let rules_first = ConfidenceGate::new(&GateConfig::default());
        let result = rules_first.categorize("coffee", None, &rules, Some(&model), |_| true);
        assert_eq!(result.category, Some(CategoryId::from("dining")));
        assert_eq!(result.strategy, Strategy::Rule);

        let classifier_first = ConfidenceGate::new(&GateConfig {
            precedence: Precedence::ClassifierFirst,
            ..GateConfig::default()
        });
        let result = classifier_first.categorize("coffee", None, &rules, Some(&model), |_| true);
        assert_eq!(result.category, Some(CategoryId::from("shopping")));
        assert_eq!(result.strategy, Strategy::Classifier);

        // Below threshold the rule still applies
        let strict = ConfidenceGate::new(&GateConfig {
            precedence: Precedence::ClassifierFirst,
            auto_assign_threshold: 1.0,
        });
        let result = strict.categorize("coffee", None, &rules, Some(&model), |_| true);
        assert_eq!(result.strategy, Strategy::Rule);

        println!("✅ Precedence test PASSED");
    }

    #[test]
    fn test_hidden_categories_are_skipped() {
        let gate = ConfidenceGate::new(&GateConfig::default());
        let rules = RuleMatcher::new(0.95);
        let model = shopping_model();

        let result = gate.categorize("coffee", None, &rules, Some(&model), |c| {
            c.as_str() != "shopping"
        });
        // Only dining remains, with its small share of the mass
        assert_eq!(result.strategy, Strategy::None);
        assert!(result.confidence < 0.5);
    }
}
