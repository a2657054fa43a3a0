// 🏷️ Category Entity - system categories plus per-user categories
//
// System categories are shared by every user and carry stable slug ids
// ("dining", "personal-care"). User categories get a UUID and are visible
// only to their owner. The engine never mutates a category; it only asks
// which ids a user may be assigned.

use crate::types::{CategoryId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

// ============================================================================
// CATEGORY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Money coming in
    Income,

    /// Money going out
    Expense,

    /// Money moved into savings or investments
    Investment,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
            CategoryKind::Investment => "investment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(CategoryKind::Income),
            "expense" => Some(CategoryKind::Expense),
            "investment" => Some(CategoryKind::Investment),
            _ => None,
        }
    }
}

// ============================================================================
// CATEGORY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identity, never changes
    pub id: CategoryId,

    /// Display name (e.g., "Dining", "Personal Care")
    pub name: String,

    pub kind: CategoryKind,

    /// Owning user; `None` for system categories
    pub owner: Option<UserId>,

    pub is_system: bool,

    /// Optional icon for UI (e.g., "🍽️")
    pub icon: Option<String>,

    /// Optional color for UI (e.g., "#FF5733")
    pub color: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Category {
    /// System category with a fixed slug id
    pub fn system(id: &str, name: &str, kind: CategoryKind, icon: &str, color: &str) -> Self {
        Category {
            id: CategoryId::from(id),
            name: name.to_string(),
            kind,
            owner: None,
            is_system: true,
            icon: Some(icon.to_string()),
            color: Some(color.to_string()),
            created_at: Utc::now(),
        }
    }

    /// New user-defined category with a fresh UUID
    pub fn for_user(name: &str, kind: CategoryKind, owner: UserId) -> Self {
        Category {
            id: CategoryId::new(uuid::Uuid::new_v4().to_string()),
            name: name.trim().to_string(),
            kind,
            owner: Some(owner),
            is_system: false,
            icon: None,
            color: None,
            created_at: Utc::now(),
        }
    }

    /// System categories are visible to everyone, user categories to their owner
    pub fn is_visible_to(&self, user: Option<UserId>) -> bool {
        self.is_system || (self.owner.is_some() && self.owner == user)
    }
}

// ============================================================================
// CATEGORY REGISTRY
// ============================================================================

/// System categories: (id, name, kind, icon, color)
const SYSTEM_CATEGORIES: &[(&str, &str, CategoryKind, &str, &str)] = &[
    ("groceries", "Groceries", CategoryKind::Expense, "🛒", "#4CAF50"),
    ("dining", "Dining", CategoryKind::Expense, "🍽️", "#FF5733"),
    ("transportation", "Transportation", CategoryKind::Expense, "🚗", "#2196F3"),
    ("utilities", "Utilities", CategoryKind::Expense, "💡", "#FFC107"),
    ("entertainment", "Entertainment", CategoryKind::Expense, "🎬", "#9C27B0"),
    ("healthcare", "Healthcare", CategoryKind::Expense, "🏥", "#F44336"),
    ("shopping", "Shopping", CategoryKind::Expense, "🛍️", "#E91E63"),
    ("housing", "Housing", CategoryKind::Expense, "🏠", "#795548"),
    ("education", "Education", CategoryKind::Expense, "🎓", "#3F51B5"),
    ("fitness", "Fitness", CategoryKind::Expense, "🏋️", "#FF9800"),
    ("travel", "Travel", CategoryKind::Expense, "✈️", "#03A9F4"),
    ("insurance", "Insurance", CategoryKind::Expense, "🛡️", "#607D8B"),
    ("subscriptions", "Subscriptions", CategoryKind::Expense, "🔁", "#673AB7"),
    ("personal-care", "Personal Care", CategoryKind::Expense, "💇", "#EC407A"),
    ("pets", "Pets", CategoryKind::Expense, "🐾", "#8D6E63"),
    ("charity", "Charity", CategoryKind::Expense, "🤝", "#26A69A"),
    ("taxes", "Taxes", CategoryKind::Expense, "🧾", "#9E9E9E"),
    ("income", "Income", CategoryKind::Income, "💰", "#66BB6A"),
    ("investment", "Investment", CategoryKind::Investment, "📈", "#00897B"),
];

/// Registry of all known categories
pub struct CategoryRegistry {
    categories: RwLock<Vec<Category>>,
}

impl CategoryRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        CategoryRegistry {
            categories: RwLock::new(Vec::new()),
        }
    }

    /// Create registry with the system categories pre-loaded
    pub fn with_defaults() -> Self {
        let registry = CategoryRegistry::new();
        for (id, name, kind, icon, color) in SYSTEM_CATEGORIES {
            registry.register(Category::system(id, name, *kind, icon, color));
        }
        registry
    }

    /// Register a category, replacing any existing one with the same id
    pub fn register(&self, category: Category) {
        let mut categories = self.categories.write().unwrap_or_else(|e| e.into_inner());
        categories.retain(|c| c.id != category.id);
        categories.push(category);
    }

    /// Find category by id
    pub fn find_by_id(&self, id: &str) -> Option<Category> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        categories.iter().find(|c| c.id.as_str() == id).cloned()
    }

    /// System categories plus the ones owned by `user`, system first, then by name
    pub fn visible_to(&self, user: Option<UserId>) -> Vec<Category> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        let mut visible: Vec<Category> = categories
            .iter()
            .filter(|c| c.is_visible_to(user))
            .cloned()
            .collect();
        visible.sort_by(|a, b| {
            b.is_system
                .cmp(&a.is_system)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        visible
    }

    /// Whether `user` may be assigned category `id`
    pub fn is_visible(&self, id: &CategoryId, user: Option<UserId>) -> bool {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        categories
            .iter()
            .any(|c| &c.id == id && c.is_visible_to(user))
    }

    /// Whether a predicted id may be handed to `user`: ids the registry does
    /// not know pass through untouched, known ids must be visible.
    pub fn is_assignable(&self, id: &CategoryId, user: Option<UserId>) -> bool {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        match categories.iter().find(|c| &c.id == id) {
            Some(category) => category.is_visible_to(user),
            None => true,
        }
    }

    /// Case-insensitive name lookup: the user's own category wins over a
    /// system category with the same name.
    pub fn resolve_name(&self, name: &str, user: Option<UserId>) -> Option<Category> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        let named = |c: &&Category| c.name.to_lowercase() == wanted;

        let own = user.and_then(|u| {
            categories
                .iter()
                .filter(named)
                .find(|c| !c.is_system && c.owner == Some(u))
        });

        own.or_else(|| categories.iter().filter(named).find(|c| c.is_system))
            .cloned()
    }

    pub fn system_categories(&self) -> Vec<Category> {
        self.visible_to(None)
    }

    /// Visible categories of one kind
    pub fn by_kind(&self, kind: CategoryKind, user: Option<UserId>) -> Vec<Category> {
        self.visible_to(user)
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect()
    }

    /// Count of all categories, system and user
    pub fn count(&self) -> usize {
        self.categories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    #[test]
    fn test_category_registry_initialization() {
        let registry = CategoryRegistry::with_defaults();

        assert_eq!(registry.count(), 19);

        let care = registry.find_by_id("personal-care").unwrap();
        assert_eq!(care.name, "Personal Care");
        assert!(care.is_system);
        assert_eq!(care.kind, CategoryKind::Expense);

        assert_eq!(registry.by_kind(CategoryKind::Income, None).len(), 1);
        assert_eq!(registry.by_kind(CategoryKind::Investment, None).len(), 1);

        println!("✅ Category registry initialization test PASSED");
    }

    #[test]
    fn test_user_categories_are_private() {
        let registry = CategoryRegistry::with_defaults();
        let side = Category::for_user("Side Projects", CategoryKind::Expense, ALICE);
        let side_id = side.id.clone();
        registry.register(side);

        assert_eq!(registry.visible_to(Some(ALICE)).len(), 20);
        assert_eq!(registry.visible_to(Some(BOB)).len(), 19);
        assert_eq!(registry.visible_to(None).len(), 19);

        assert!(registry.is_visible(&side_id, Some(ALICE)));
        assert!(!registry.is_visible(&side_id, Some(BOB)));
        assert!(!registry.is_visible(&side_id, None));
        assert!(registry.is_visible(&CategoryId::from("dining"), Some(BOB)));
        assert!(!registry.is_visible(&CategoryId::from("nope"), Some(BOB)));

        assert!(registry.is_assignable(&CategoryId::from("nope"), Some(BOB)));
        assert!(registry.is_assignable(&side_id, Some(ALICE)));
        assert!(!registry.is_assignable(&side_id, Some(BOB)));

        // System categories sort first
        let visible = registry.visible_to(Some(ALICE));
        assert!(visible[..19].iter().all(|c| c.is_system));
        assert_eq!(visible[19].name, "Side Projects");
    }

    #[test]
    fn test_resolve_name_prefers_own_category() {
        let registry = CategoryRegistry::with_defaults();
        let own = Category::for_user("Dining", CategoryKind::Expense, ALICE);
        let own_id = own.id.clone();
        registry.register(own);

        assert_eq!(registry.resolve_name("dining", Some(ALICE)).unwrap().id, own_id);
        assert_eq!(
            registry.resolve_name("DINING", Some(BOB)).unwrap().id,
            CategoryId::from("dining")
        );
        assert_eq!(
            registry.resolve_name(" personal care ", None).unwrap().id,
            CategoryId::from("personal-care")
        );
        assert!(registry.resolve_name("Unknown Category", Some(ALICE)).is_none());
        assert!(registry.resolve_name("", Some(ALICE)).is_none());
    }

    #[test]
    fn test_category_kind_parse() {
        assert_eq!(CategoryKind::parse("Income"), Some(CategoryKind::Income));
        assert_eq!(CategoryKind::parse(" expense "), Some(CategoryKind::Expense));
        assert_eq!(CategoryKind::parse("transfer"), None);
        assert_eq!(CategoryKind::Investment.as_str(), "investment");
    }
}
