// 🏷️ Rule Matcher - Rules as Data
// Deterministic keyword/merchant patterns mapped to categories
//
// Matching is case-insensitive substring containment (or `*` wildcards).
// User overrides are checked before system rules. Within a table, longer
// patterns are checked first; priority only orders rules of equal length.

use crate::types::{CategoryId, UserId};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Brand names win over generic keywords of the same length
const MERCHANT_PRIORITY: i32 = 10;

const KEYWORD_PRIORITY: i32 = 0;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Rule ID for tracking
    pub id: String,

    /// Pattern to match (supports wildcards with *)
    pub pattern: String,

    /// Category to assign
    pub category: CategoryId,

    /// Tiebreak between patterns of equal length (higher = applied first)
    #[serde(default)]
    pub priority: i32,

    /// Description/notes about this rule
    #[serde(default)]
    pub description: Option<String>,
}

impl MatchRule {
    pub fn new(id: &str, pattern: &str, category: impl Into<CategoryId>) -> Self {
        MatchRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            category: category.into(),
            priority: 0,
            description: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Pattern length without wildcards
    pub fn specificity(&self) -> usize {
        self.pattern.chars().filter(|c| *c != '*').count()
    }

    /// Check if pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        let pattern_lower = self.pattern.to_lowercase();
        let text_lower = text.to_lowercase();

        if pattern_lower.trim_matches('*').is_empty() {
            return false;
        }

        if !pattern_lower.contains('*') {
            return text_lower.contains(&pattern_lower);
        }

        // Wildcard matching: anchored at both ends unless the pattern
        // starts/ends with `*`
        let parts: Vec<&str> = pattern_lower.split('*').collect();
        let first = parts[0];
        let last = parts[parts.len() - 1];

        if !text_lower.starts_with(first) {
            return false;
        }

        let mut current_pos = first.len();
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            match text_lower[current_pos..].find(part) {
                Some(pos) => current_pos += pos + part.len(),
                None => return false,
            }
        }

        text_lower.len() >= current_pos + last.len() && text_lower[current_pos..].ends_with(last)
    }
}

/// Longer patterns first, then priority, then id for a stable order
fn sort_rules(rules: &mut [MatchRule]) {
    rules.sort_by(|a, b| {
        b.specificity()
            .cmp(&a.specificity())
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMatch {
    pub category: Option<CategoryId>,
    pub confidence: f64,
    pub rule_id: Option<String>,
}

impl RuleMatch {
    pub fn is_match(&self) -> bool {
        self.category.is_some()
    }
}

// ============================================================================
// RULE MATCHER
// ============================================================================

pub struct RuleMatcher {
    system: Vec<MatchRule>,
    user: HashMap<UserId, Vec<MatchRule>>,
    confidence: f64,
}

impl RuleMatcher {
    /// Create an empty matcher reporting `confidence` for every match
    pub fn new(confidence: f64) -> Self {
        RuleMatcher {
            system: Vec::new(),
            user: HashMap::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Matcher preloaded with the built-in merchant/keyword table
    pub fn with_defaults(confidence: f64) -> Self {
        let mut matcher = RuleMatcher::new(confidence);
        matcher.extend_system(default_rules());
        matcher
    }

    /// Load system rules from a JSON file
    pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<Vec<MatchRule>> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<MatchRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        Ok(rules)
    }

    pub fn add_system_rule(&mut self, rule: MatchRule) {
        self.system.push(rule);
        sort_rules(&mut self.system);
    }

    pub fn extend_system(&mut self, rules: Vec<MatchRule>) {
        self.system.extend(rules);
        sort_rules(&mut self.system);
    }

    /// Add a rule that applies only to `user` and wins over system rules
    pub fn add_user_rule(&mut self, user: UserId, rule: MatchRule) {
        let rules = self.user.entry(user).or_default();
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
        sort_rules(rules);
    }

    /// Remove a user rule by id, returning whether one existed
    pub fn remove_user_rule(&mut self, user: UserId, rule_id: &str) -> bool {
        let Some(rules) = self.user.get_mut(&user) else {
            return false;
        };
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        before != rules.len()
    }

    /// First matching rule: user overrides, then system rules
    pub fn classify(&self, text: &str, user: Option<UserId>) -> RuleMatch {
        if text.trim().is_empty() {
            return RuleMatch::default();
        }

        let user_rules = user
            .and_then(|u| self.user.get(&u))
            .map(|rules| rules.as_slice())
            .unwrap_or(&[]);

        for rule in user_rules.iter().chain(self.system.iter()) {
            if rule.matches(text) {
                return RuleMatch {
                    category: Some(rule.category.clone()),
                    confidence: self.confidence,
                    rule_id: Some(rule.id.clone()),
                };
            }
        }

        // No match found
        RuleMatch::default()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn system_rule_count(&self) -> usize {
        self.system.len()
    }

    pub fn user_rule_count(&self, user: UserId) -> usize {
        self.user.get(&user).map_or(0, |rules| rules.len())
    }
}

// ============================================================================
// BUILT-IN TABLE
// ============================================================================

/// Brand and merchant names
const MERCHANTS: &[(&str, &[&str])] = &[
    ("groceries", &["walmart", "whole foods", "trader joe", "safeway", "kroger", "costco", "aldi", "publix", "food lion"]),
    ("dining", &["starbucks", "mcdonald", "chipotle", "subway", "taco bell", "wendy", "dunkin", "panera", "doordash", "uber eats"]),
    ("transportation", &["shell", "chevron", "exxon", "uber", "lyft"]),
    ("shopping", &["amazon", "best buy", "target store", "nike", "home depot", "macys"]),
    ("utilities", &["verizon", "comcast", "spectrum"]),
    ("entertainment", &["netflix", "spotify", "hulu", "disney", "hbo"]),
    ("healthcare", &["cvs", "walgreen"]),
    ("travel", &["airbnb"]),
    ("education", &["udemy"]),
];

/// Generic keywords. Very short or ambiguous words are left out because
/// matching is substring containment.
const KEYWORDS: &[(&str, &[&str])] = &[
    ("groceries", &["grocery", "groceries", "supermarket", "food market", "food store"]),
    ("dining", &["coffee", "restaurant", "pizza", "burger", "cafe", "dining", "lunch", "dinner", "breakfast"]),
    ("transportation", &["petrol", "gasoline", "gas station", "fuel", "parking", "car wash", "oil change", "taxi", "metro", "transit", "car service"]),
    ("housing", &["rent payment", "monthly rent", "mortgage", "landlord", "apartment", "house payment", "rental", "condo"]),
    ("income", &["salary", "payroll", "paycheck", "scholarship", "bonus", "commission", "freelance", "income", "stipend"]),
    ("shopping", &["shopping", "retail", "clothing", "online order"]),
    ("utilities", &["electric", "electricity", "water bill", "internet", "phone bill", "cable", "utility"]),
    ("entertainment", &["movie", "concert", "gaming", "entertainment", "streaming", "music"]),
    ("healthcare", &["pharmacy", "doctor", "dentist", "hospital", "medical", "prescription", "clinic", "checkup", "eye exam", "optical", "therapy", "dermatolog"]),
    ("fitness", &["gym", "fitness", "yoga", "workout", "trainer", "exercise"]),
    ("travel", &["hotel", "airline", "flight", "vacation", "booking", "resort", "cruise", "getaway"]),
    ("insurance", &["insurance", "premium", "coverage"]),
    ("subscriptions", &["subscription", "membership", "monthly fee"]),
    ("education", &["tuition", "textbook", "course", "school"]),
    ("pets", &["pet store", "pet shop", "veterinary", "dog food", "cat food", "pet food", "pet supply", "animal hospital", "pet grooming"]),
    ("investment", &["401k", "investment", "brokerage", "portfolio", "mutual fund", "crypto", "bitcoin", "stock market"]),
    ("charity", &["donation", "charity", "church", "fundraiser", "charitable"]),
    ("taxes", &["tax payment", "federal tax", "state tax", "accountant"]),
    ("personal-care", &["salon", "haircut", "massage", "cosmetic", "manicure", "pedicure", "skincare"]),
];

fn table_rules(table: &[(&str, &[&str])], kind: &str, priority: i32) -> Vec<MatchRule> {
    table
        .iter()
        .flat_map(|(category, patterns)| {
            patterns.iter().map(move |pattern| {
                let id = format!("system:{}:{}", kind, pattern.replace(' ', "-"));
                MatchRule::new(&id, pattern, *category).with_priority(priority)
            })
        })
        .collect()
}

/// Built-in system rules keyed by system category id
pub fn default_rules() -> Vec<MatchRule> {
    let mut rules = table_rules(MERCHANTS, "merchant", MERCHANT_PRIORITY);
    rules.extend(table_rules(KEYWORDS, "keyword", KEYWORD_PRIORITY));
    rules
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(7);

    #[test]
    fn test_exact_pattern_match() {
        let rule = MatchRule::new("test1", "STARBUCKS", "dining");

        assert!(rule.matches("STARBUCKS COFFEE"));
        assert!(rule.matches("starbucks"));
        assert!(rule.matches("Paid at Starbucks #12"));
        assert!(!rule.matches("AMAZON"));
    }

    #[test]
    fn test_wildcard_pattern() {
        let rule = MatchRule::new("test2", "STARBUCKS*", "dining");

        assert!(rule.matches("STARBUCKS COFFEE"));
        assert!(rule.matches("STARBUCKS #4521"));
        assert!(rule.matches("starbucks downtown"));
        assert!(!rule.matches("COFFEE STARBUCKS"));

        let middle = MatchRule::new("test3", "*amazon*marketplace*", "shopping");
        assert!(middle.matches("PAYPAL AMAZON EU MARKETPLACE 123"));
        assert!(!middle.matches("MARKETPLACE AMAZON"));

        assert!(!MatchRule::new("empty", "**", "shopping").matches("anything"));
    }

    #[test]
    fn test_specificity_ordering() {
        let mut matcher = RuleMatcher::new(0.95);
        matcher.add_system_rule(MatchRule::new("gas", "gas", "utilities"));
        matcher.add_system_rule(MatchRule::new("gas-station", "gas station", "transportation"));

        let result = matcher.classify("SHELL GAS STATION 0042", None);
        assert_eq!(result.category, Some(CategoryId::from("transportation")));
        assert_eq!(result.rule_id, Some("gas-station".to_string()));

        let result = matcher.classify("City gas bill", None);
        assert_eq!(result.category, Some(CategoryId::from("utilities")));
    }

    #[test]
    fn test_rule_priority_breaks_length_ties() {
        let mut matcher = RuleMatcher::new(0.95);

        matcher.add_system_rule(MatchRule::new("low", "AMAZON", "shopping").with_priority(1));
        matcher.add_system_rule(MatchRule::new("high", "amazon", "online").with_priority(100));

        let result = matcher.classify("AMAZON.COM MARKETPLACE", None);
        assert_eq!(result.category, Some(CategoryId::from("online")));
        assert_eq!(result.confidence, 0.95);

        // A longer pattern still wins over a higher priority
        matcher.add_system_rule(MatchRule::new("specific", "AMAZON.COM MARKETPLACE", "marketplace"));
        let result = matcher.classify("AMAZON.COM MARKETPLACE", None);
        assert_eq!(result.category, Some(CategoryId::from("marketplace")));
    }

    #[test]
    fn test_user_rule_beats_system_rule() {
        let mut matcher = RuleMatcher::new(0.95);
        matcher.add_system_rule(
            MatchRule::new("system-costco", "costco gasoline", "transportation").with_priority(50),
        );
        matcher.add_user_rule(USER, MatchRule::new("user-costco", "costco", "groceries"));

        let result = matcher.classify("COSTCO GASOLINE #221", Some(USER));
        assert_eq!(result.category, Some(CategoryId::from("groceries")));
        assert_eq!(result.rule_id, Some("user-costco".to_string()));

        // Other users still see the system rule
        let result = matcher.classify("COSTCO GASOLINE #221", Some(UserId(8)));
        assert_eq!(result.category, Some(CategoryId::from("transportation")));

        let result = matcher.classify("COSTCO GASOLINE #221", None);
        assert_eq!(result.category, Some(CategoryId::from("transportation")));
    }

    #[test]
    fn test_user_rule_replace_and_remove() {
        let mut matcher = RuleMatcher::new(0.95);
        matcher.add_user_rule(USER, MatchRule::new("mine", "acme", "shopping"));
        matcher.add_user_rule(USER, MatchRule::new("mine", "acme", "pets"));
        assert_eq!(matcher.user_rule_count(USER), 1);

        let result = matcher.classify("acme store", Some(USER));
        assert_eq!(result.category, Some(CategoryId::from("pets")));

        assert!(matcher.remove_user_rule(USER, "mine"));
        assert!(!matcher.remove_user_rule(USER, "mine"));
        assert!(!matcher.classify("acme store", Some(USER)).is_match());
    }

    #[test]
    fn test_no_match() {
        let matcher = RuleMatcher::new(0.95);
        let result = matcher.classify("UNKNOWN MERCHANT", None);

        assert_eq!(result.category, None);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.rule_id, None);

        let empty = RuleMatcher::with_defaults(0.95).classify("   ", None);
        assert!(!empty.is_match());
    }

    #[test]
    fn test_default_table() {
        let matcher = RuleMatcher::with_defaults(0.95);
        assert!(matcher.system_rule_count() > 100);

        let cases = [
            ("STARBUCKS STORE 00123", "dining"),
            ("Shell Oil 5531", "transportation"),
            ("Auto insurance premium", "insurance"),
            ("Stock market deposit", "investment"),
            ("TAXI TO AIRPORT", "transportation"),
            ("Spotify Premium", "entertainment"),
        ];
        for (text, expected) in cases {
            let result = matcher.classify(text, None);
            assert_eq!(result.category, Some(CategoryId::from(expected)), "{}", text);
        }

        assert!(!matcher.classify("Acme Unknown Merchant", None).is_match());
    }

    #[test]
    fn test_default_table_prefers_longer_keywords_over_merchants() {
        let matcher = RuleMatcher::with_defaults(0.95);

        let cases = [
            ("WALMART PHARMACY", "healthcare", "system:keyword:pharmacy"),
            ("COSTCO GASOLINE", "transportation", "system:keyword:gasoline"),
            ("Shellfish restaurant", "dining", "system:keyword:restaurant"),
        ];
        for (text, category, rule_id) in cases {
            let result = matcher.classify(text, None);
            assert_eq!(result.category, Some(CategoryId::from(category)), "{}", text);
            assert_eq!(result.rule_id.as_deref(), Some(rule_id), "{}", text);
        }

        // Equal length: the merchant name decides
        let result = matcher.classify("Spotify Premium", None);
        assert_eq!(result.rule_id.as_deref(), Some("system:merchant:spotify"));

        println!("✅ Default table specificity test PASSED");
    }

    #[test]
    fn test_load_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[{"id": "r1", "pattern": "farmers market", "category": "groceries", "priority": 5},
                {"id": "r2", "pattern": "parking*", "category": "transportation"}]"#,
        )
        .unwrap();

        let rules = RuleMatcher::load_rules(&path).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].priority, 5);
        assert_eq!(rules[1].priority, 0);

        assert!(RuleMatcher::load_rules(dir.path().join("missing.json")).is_err());
    }
}
