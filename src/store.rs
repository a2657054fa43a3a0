// 🗄️ Transaction Store - SQLite collaborator for the engine
//
// Holds transactions, user-defined categories and an audit trail of events.
// Every labeled row (assigned at import, predicted, or corrected by the
// user) is a training example; a correction is just a newer label.

use crate::entities::category::{Category, CategoryKind};
use crate::training::ExampleSource;
use crate::types::{CategoryId, PredictionResult, TrainingExample, UserId};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Row id, 0 until stored
    pub id: i64,
    pub user: UserId,
    pub date: String,
    pub amount: f64,
    /// "expense" or "income"
    pub transaction_type: String,
    pub description: String,
    pub category: Option<CategoryId>,
    /// Category was assigned by the engine, not by the user
    pub auto_categorized: bool,
    /// Engine confidence for an automatic assignment
    pub confidence: Option<f64>,
    /// When the current category was set
    pub labeled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(user: UserId, date: &str, amount: f64, transaction_type: &str, description: &str) -> Self {
        Transaction {
            id: 0,
            user,
            date: date.trim().to_string(),
            amount,
            transaction_type: transaction_type.trim().to_lowercase(),
            description: description.trim().to_string(),
            category: None,
            auto_categorized: false,
            confidence: None,
            labeled_at: None,
            created_at: Utc::now(),
        }
    }

    /// Transaction with a category chosen by the user
    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self.labeled_at = Some(self.created_at);
        self
    }

    /// Hash for duplicate detection on re-import (not identity)
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.user, self.date, self.amount, self.description
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn is_categorized(&self) -> bool {
        self.category.is_some()
    }
}

// ============================================================================
// EVENT
// ============================================================================

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            user_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            amount REAL NOT NULL,
            transaction_type TEXT NOT NULL,
            description TEXT NOT NULL,
            category_id TEXT,
            auto_categorized INTEGER NOT NULL DEFAULT 0,
            confidence REAL,
            labeled_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            icon TEXT,
            color TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, category_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_labeled ON transactions(labeled_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Fixed-width UTC timestamps so text comparison in SQL follows time order
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, user_id, date, amount, transaction_type, description,
     category_id, auto_categorized, confidence, labeled_at, created_at";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let labeled_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;

    Ok(Transaction {
        id: row.get(0)?,
        user: UserId(row.get(1)?),
        date: row.get(2)?,
        amount: row.get(3)?,
        transaction_type: row.get(4)?,
        description: row.get(5)?,
        category: row.get::<_, Option<String>>(6)?.map(CategoryId),
        auto_categorized: row.get(7)?,
        confidence: row.get(8)?,
        labeled_at: labeled_at.as_deref().map(|s| parse_timestamp(s, 9)).transpose()?,
        created_at: parse_timestamp(&created_at, 10)?,
    })
}

/// Insert a transaction; `None` when an identical one is already stored
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<Option<i64>> {
    let hash = tx.compute_idempotency_hash();

    let result = conn.execute(
        "INSERT INTO transactions (
            idempotency_hash, user_id, date, amount, transaction_type, description,
            category_id, auto_categorized, confidence, labeled_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            hash,
            tx.user.0,
            tx.date,
            tx.amount,
            tx.transaction_type,
            tx.description,
            tx.category.as_ref().map(|c| c.as_str()),
            tx.auto_categorized,
            tx.confidence,
            tx.labeled_at.map(timestamp),
            timestamp(tx.created_at),
        ],
    );

    match result {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            let event = Event::new(
                "transaction_added",
                "transaction",
                &id.to_string(),
                serde_json::json!({
                    "user": tx.user.0,
                    "amount": tx.amount,
                    "category": tx.category,
                }),
                "importer",
            );
            insert_event(conn, &event)?;
            Ok(Some(id))
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    let tx = conn
        .query_row(&sql, params![id], transaction_from_row)
        .optional()
        .context("Failed to load transaction")?;
    Ok(tx)
}

/// Store an engine decision on an uncategorized transaction.
///
/// Returns false (and changes nothing) when the decision assigns no
/// category or the transaction already has one.
pub fn apply_prediction(conn: &Connection, id: i64, prediction: &PredictionResult) -> Result<bool> {
    let Some(category) = &prediction.category else {
        return Ok(false);
    };

    let updated = conn.execute(
        "UPDATE transactions
         SET category_id = ?1, auto_categorized = 1, confidence = ?2, labeled_at = ?3
         WHERE id = ?4 AND category_id IS NULL",
        params![category.as_str(), prediction.confidence, timestamp(Utc::now()), id],
    )?;

    if updated == 0 {
        return Ok(false);
    }

    let event = Event::new(
        "category_predicted",
        "transaction",
        &id.to_string(),
        serde_json::json!({
            "category": category,
            "confidence": prediction.confidence,
            "strategy": prediction.strategy,
        }),
        "categorizer",
    );
    insert_event(conn, &event)?;
    Ok(true)
}

/// User sets (or replaces) the category of one of their transactions.
/// The row becomes a user label and the change is logged.
pub fn record_correction(conn: &Connection, id: i64, user: UserId, category: &CategoryId) -> Result<()> {
    let Some(tx) = get_transaction(conn, id)? else {
        bail!("Transaction {} not found", id);
    };
    if tx.user != user {
        bail!("Transaction {} does not belong to user {}", id, user);
    }

    conn.execute(
        "UPDATE transactions
         SET category_id = ?1, auto_categorized = 0, confidence = NULL, labeled_at = ?2
         WHERE id = ?3",
        params![category.as_str(), timestamp(Utc::now()), id],
    )?;

    let event = Event::new(
        "category_corrected",
        "transaction",
        &id.to_string(),
        serde_json::json!({
            "from": tx.category,
            "to": category,
            "was_auto": tx.auto_categorized,
        }),
        &format!("user:{}", user),
    );
    insert_event(conn, &event)?;
    Ok(())
}

pub fn uncategorized_for_user(conn: &Connection, user: UserId) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE user_id = ?1 AND category_id IS NULL ORDER BY id",
        TRANSACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user.0], transaction_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn transactions_for_user(conn: &Connection, user: UserId) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE user_id = ?1 ORDER BY id",
        TRANSACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user.0], transaction_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Every categorized transaction as a training example, in insertion order.
/// With `as_of`, only labels set at or before that instant.
pub fn labeled_examples(conn: &Connection, as_of: Option<DateTime<Utc>>) -> Result<Vec<TrainingExample>> {
    let mut stmt = conn.prepare(
        "SELECT description, category_id FROM transactions
         WHERE category_id IS NOT NULL
           AND (?1 IS NULL OR labeled_at <= ?1)
         ORDER BY id",
    )?;

    let examples = stmt
        .query_map(params![as_of.map(timestamp)], |row| {
            let description: String = row.get(0)?;
            let category: String = row.get(1)?;
            Ok(TrainingExample::new(description, category))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(examples)
}

impl ExampleSource for Connection {
    fn labeled_examples(&self, as_of: Option<DateTime<Utc>>) -> Result<Vec<TrainingExample>> {
        labeled_examples(self, as_of)
    }
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// USER CATEGORIES
// ============================================================================

pub fn insert_user_category(conn: &Connection, category: &Category) -> Result<()> {
    let Some(owner) = category.owner else {
        bail!("Category {} has no owner", category.id);
    };

    conn.execute(
        "INSERT INTO categories (id, user_id, name, kind, icon, color, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            category.id.as_str(),
            owner.0,
            category.name,
            category.kind.as_str(),
            category.icon,
            category.color,
            timestamp(category.created_at),
        ],
    )
    .with_context(|| format!("Failed to store category {:?}", category.name))?;

    let event = Event::new(
        "category_created",
        "category",
        category.id.as_str(),
        serde_json::json!({ "name": category.name, "kind": category.kind }),
        &format!("user:{}", owner),
    );
    insert_event(conn, &event)?;
    Ok(())
}

/// All user-defined categories (every owner)
pub fn load_user_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, kind, icon, color, created_at FROM categories ORDER BY created_at, id",
    )?;

    let categories = stmt
        .query_map([], |row| {
            let kind: String = row.get(3)?;
            let created_at: String = row.get(6)?;
            Ok(Category {
                id: CategoryId(row.get(0)?),
                owner: Some(UserId(row.get(1)?)),
                name: row.get(2)?,
                kind: CategoryKind::parse(&kind).unwrap_or(CategoryKind::Expense),
                is_system: false,
                icon: row.get(4)?,
                color: row.get(5)?,
                created_at: parse_timestamp(&created_at, 6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(categories)
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            timestamp(event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for one entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp_str, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================
