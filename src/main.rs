//! spend-categorizer - command line front end
//!
//! Train the categorization model, categorize descriptions, and run the
//! CSV import / correction loop against a local SQLite store.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use spend_categorizer::{
    bulk_categorize, import_csv, insert_user_category, load_corpus, load_user_categories,
    record_correction, setup_database, CancellationToken, Categorizer, Category, CategoryKind,
    EngineConfig, UserId,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL_PATH: &str = "model.json";

#[derive(Parser)]
#[command(name = "spend-categorizer")]
#[command(about = "Transaction auto-categorization: rules, TF-IDF features and a retrainable classifier", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration (TOML); defaults apply when the file is missing
    #[arg(long, env = "SPEND_CATEGORIZER_CONFIG", default_value = "spend-categorizer.toml")]
    config: PathBuf,

    /// SQLite transaction store
    #[arg(long, env = "SPEND_CATEGORIZER_DB", default_value = "transactions.db")]
    db: PathBuf,

    /// Model artifact path (overrides training.model_path)
    #[arg(long, env = "SPEND_CATEGORIZER_MODEL")]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrain the classifier and publish the new model
    Train {
        /// Train from a `description,category` CSV instead of the store
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Only use labels recorded at or before this instant (RFC 3339)
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Categorize one description
    Categorize {
        description: String,
        #[arg(short, long)]
        user: Option<i64>,
    },
    /// Import a CSV (date,amount,type,description,category) for a user
    Import {
        csv: PathBuf,
        #[arg(short, long)]
        user: i64,
    },
    /// Set the category of a stored transaction (a user correction)
    Correct {
        transaction_id: i64,
        /// Category name or id
        category: String,
        #[arg(short, long, default_value = "1")]
        user: i64,
    },
    /// Categorize every uncategorized transaction of a user
    BulkCategorize {
        #[arg(short, long)]
        user: i64,
    },
    /// List the categories visible to a user
    Categories {
        #[arg(short, long)]
        user: Option<i64>,
    },
    /// Create a user-defined category
    AddCategory {
        name: String,
        #[arg(short, long)]
        user: i64,
        /// income, expense or investment
        #[arg(short, long, default_value = "expense")]
        kind: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging (WARN level by default, use RUST_LOG=info for more)
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(&cli.config)?;
    if let Some(model) = cli.model {
        config.training.model_path = Some(model);
    } else if config.training.model_path.is_none() {
        config.training.model_path = Some(PathBuf::from(DEFAULT_MODEL_PATH));
    }

    let conn = Connection::open(&cli.db)
        .with_context(|| format!("Failed to open database {:?}", cli.db))?;
    setup_database(&conn)?;

    let engine = Categorizer::new(config)?;
    for category in load_user_categories(&conn)? {
        engine.categories().register(category);
    }

    match cli.command {
        Commands::Train { corpus, as_of } => run_train(&engine, &conn, corpus, as_of),
        Commands::Categorize { description, user } => {
            let result = engine.categorize(&description, user.map(UserId));
            match &result.category {
                Some(category) => println!(
                    "🏷️  {} ({:.1}% via {})",
                    display_name(&engine, category.as_str()),
                    result.confidence * 100.0,
                    result.strategy
                ),
                None => println!(
                    "❔ Uncategorized (best confidence {:.1}%)",
                    result.confidence * 100.0
                ),
            }
            Ok(())
        }
        Commands::Import { csv, user } => {
            let summary = import_csv(&conn, &engine, UserId(user), &csv)?;
            println!("✓ Inserted: {} transactions", summary.created);
            println!("✓ Skipped duplicates: {}", summary.duplicates);
            println!("✓ Auto-categorized: {}", summary.auto_categorized);
            for error in &summary.errors {
                println!("✗ Row {}: {}", error.row, error.message);
            }
            Ok(())
        }
        Commands::Correct { transaction_id, category, user } => {
            let user = UserId(user);
            let resolved = engine
                .categories()
                .resolve_name(&category, Some(user))
                .or_else(|| engine.categories().find_by_id(&category))
                .filter(|c| c.is_visible_to(Some(user)));
            let Some(resolved) = resolved else {
                bail!("Unknown category {:?} for user {}", category, user);
            };
            record_correction(&conn, transaction_id, user, &resolved.id)?;
            println!("✅ Transaction {} → {}", transaction_id, resolved.name);
            Ok(())
        }
        Commands::BulkCategorize { user } => {
            let summary = bulk_categorize(&conn, &engine, UserId(user))?;
            println!(
                "✅ Categorized {} of {} transactions",
                summary.categorized, summary.total
            );
            Ok(())
        }
        Commands::Categories { user } => {
            for category in engine.categories().visible_to(user.map(UserId)) {
                println!(
                    "{} {:<16} {:<10} {}{}",
                    category.icon.as_deref().unwrap_or("•"),
                    category.id,
                    category.kind.as_str(),
                    category.name,
                    if category.is_system { "" } else { " (custom)" }
                );
            }
            Ok(())
        }
        Commands::AddCategory { name, user, kind } => {
            let Some(kind) = CategoryKind::parse(&kind) else {
                bail!("Unknown category kind {:?} (income, expense, investment)", kind);
            };
            let category = Category::for_user(&name, kind, UserId(user));
            insert_user_category(&conn, &category)?;
            println!("✅ Created {} ({})", category.name, category.id);
            Ok(())
        }
    }
}

fn run_train(
    engine: &Categorizer,
    conn: &Connection,
    corpus: Option<PathBuf>,
    as_of: Option<String>,
) -> Result<()> {
    let as_of = as_of
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid --as-of timestamp {:?}", s))
        })
        .transpose()?;

    if corpus.is_some() && as_of.is_some() {
        bail!("--as-of needs label timestamps from the store; it cannot be combined with --corpus");
    }

    let cancel = CancellationToken::new();
    let report = match corpus {
        Some(path) => {
            let examples = load_corpus(&path)?;
            println!("📂 Loaded {} examples from {:?}", examples.len(), path);
            engine.retrain(&examples, as_of, &cancel)?
        }
        None => engine.retrain(conn, as_of, &cancel)?,
    };

    println!("🎉 {}", report.summary());
    if !report.excluded_categories.is_empty() {
        println!(
            "   Rule-only categories (too few examples): {}",
            report
                .excluded_categories
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

/// RUST_LOG directives when set and valid, otherwise WARN
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn display_name(engine: &Categorizer, id: &str) -> String {
    engine
        .categories()
        .find_by_id(id)
        .map(|c| c.name)
        .unwrap_or_else(|| id.to_string())
}
