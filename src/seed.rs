// 🌱 Seed Corpus - built-in labeled descriptions
//
// Gives a fresh install a usable classifier before any user has labeled a
// transaction. Keyed by system category id.

use crate::types::TrainingExample;

const SEED: &[(&str, &[&str])] = &[
    (
        "groceries",
        &[
            "Walmart", "Whole Foods", "Trader Joes", "Safeway", "Kroger", "Target", "Costco",
            "Aldi", "grocery", "groceries", "supermarket", "food shopping", "weekly shopping",
            "Publix", "Food Lion", "fresh produce", "farmers market", "organic food", "bulk food",
            "food store", "market", "pantry", "vegetables", "fruits", "meat market", "dairy",
            "bakery", "frozen food", "canned goods", "snacks",
        ],
    ),
    (
        "dining",
        &[
            "Starbucks", "McDonalds", "Chipotle", "Subway", "Dominos", "Pizza Hut", "Burger King",
            "restaurant", "cafe", "coffee", "lunch", "dinner", "breakfast", "Panera",
            "Olive Garden", "Applebees", "fast food", "takeout", "food delivery", "uber eats",
            "doordash", "dining out", "eat out", "Wendys", "Taco Bell", "KFC", "Chick fil A",
            "Popeyes", "Dunkin",
        ],
    ),
    (
        "transportation",
        &[
            "Shell", "Chevron", "gas", "fuel", "Uber", "Lyft", "taxi", "metro", "bus", "parking",
            "car wash", "auto repair", "oil change", "BP", "Exxon", "gas station", "ride share",
            "transit", "subway", "car service",
        ],
    ),
    (
        "housing",
        &[
            "rent", "rent payment", "mortgage", "lease", "apartment", "house payment",
            "monthly rent", "rental", "landlord", "property", "HOA", "home insurance",
            "renter insurance", "housing", "home repair", "plumbing", "electrical", "HVAC",
            "roof", "maintenance",
        ],
    ),
    (
        "income",
        &[
            "salary", "payroll", "paycheck", "wages", "scholarship", "grant", "award",
            "freelance", "bonus", "commission", "income", "earnings", "stipend",
            "payment received", "direct deposit", "consulting", "contract", "gig",
            "side hustle",
        ],
    ),
    (
        "shopping",
        &[
            "Amazon", "shopping", "Target store", "Best Buy", "Home Depot", "Lowes", "Macys",
            "Nike", "Apple Store", "online order", "purchase", "retail", "clothing",
            "electronics", "shoes", "furniture", "mall", "outlet", "department store",
            "accessories",
        ],
    ),
    (
        "utilities",
        &[
            "electric", "water", "gas bill", "internet", "phone bill", "cable", "utility",
            "Verizon", "ATT", "Comcast", "Spectrum", "power bill", "heating", "cooling",
            "energy",
        ],
    ),
    (
        "entertainment",
        &[
            "Netflix", "Spotify", "Amazon Prime", "Disney", "HBO", "Hulu", "movie", "concert",
            "theater", "gaming", "entertainment", "Apple Music", "YouTube", "streaming",
            "subscription service",
        ],
    ),
    (
        "healthcare",
        &[
            "CVS", "Walgreens", "pharmacy", "doctor", "dentist", "hospital", "medical",
            "prescription", "health", "clinic", "urgent care", "physical therapy",
            "mental health", "eye exam", "dental",
        ],
    ),
    (
        "education",
        &["tuition", "student loan", "textbook", "school", "course", "udemy", "training"],
    ),
    (
        "fitness",
        &["gym", "yoga", "fitness", "workout", "sports", "trainer", "exercise"],
    ),
    (
        "travel",
        &["hotel", "airbnb", "airline", "flight", "vacation", "travel", "booking"],
    ),
    (
        "insurance",
        &["insurance", "auto insurance", "health insurance", "life insurance", "policy"],
    ),
    (
        "subscriptions",
        &["subscription", "membership", "magazine", "software", "cloud storage"],
    ),
    (
        "personal-care",
        &["salon", "haircut", "spa", "massage", "cosmetics", "skincare"],
    ),
    (
        "pets",
        &["pet", "vet", "veterinary", "dog", "cat", "pet food", "grooming"],
    ),
    (
        "investment",
        &["stock", "401k", "IRA", "investment", "mutual fund", "brokerage"],
    ),
    (
        "charity",
        &["donation", "charity", "church", "nonprofit", "fundraiser"],
    ),
    (
        "taxes",
        &["tax", "IRS", "federal tax", "state tax", "tax payment", "accountant"],
    ),
];

/// The built-in corpus, in a fixed order
pub fn default_examples() -> Vec<TrainingExample> {
    SEED.iter()
        .flat_map(|(category, descriptions)| {
            descriptions
                .iter()
                .map(move |description| TrainingExample::new(*description, *category))
        })
        .collect()
}
