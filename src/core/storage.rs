//! Storage - SQLite backend
//!
//! Uses SQLite with FTS5 for full-text search over fact keys and values.
//!
//! # Key Points
//! - One row per `(project_id, fact_key)`, enforced by a unique index
//! - Ranked-list facts also carry `topic` and `list_rank` columns
//! - Every write runs in a `BEGIN IMMEDIATE` transaction, so the
//!   read-compare-write of store-or-update is atomic even across processes
//! - Rows are only deleted by [`FactStore::clear`]

use std::path::Path as FilePath;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::debug;
use ulid::Ulid;

use super::canonical::canonicalize;
use super::error::{StoreError, StoreResult};
use super::fact::{parse_ranked_key, ranked_key, Fact, RankedEntry, StoreAction, StoreOutcome};
use super::hit::{MemoryHit, SourceType, HINT_FACT_KEY, HINT_TOPIC};
use super::store::{ClearScope, FactStore, MessageIdentity, RankedWrite};

/// Database storage
pub struct Storage {
    conn: Mutex<Connection>,
    path: Option<std::path::PathBuf>,
}

impl Storage {
    /// Open or create a database
    pub fn open(path: &FilePath) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open database")?;

        // WAL for concurrent readers, busy timeout so competing writers wait
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        let storage = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Database file, `None` for in-memory storage
    pub fn path(&self) -> Option<&FilePath> {
        self.path.as_deref()
    }

    /// Open a second connection to the same database file.
    /// In-memory databases get a fresh, empty database.
    pub fn clone_connection(&self) -> Result<Self> {
        match &self.path {
            Some(path) => Self::open(path),
            None => Self::open_memory(),
        }
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            -- Facts table
            CREATE TABLE IF NOT EXISTS facts (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                fact_key TEXT NOT NULL,
                value_text TEXT NOT NULL,
                value_type TEXT NOT NULL DEFAULT 'string',
                confidence REAL NOT NULL DEFAULT 0.5,
                source_message_id TEXT,
                topic TEXT,       -- set for user.favorites.<topic>.<rank>
                list_rank INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_facts_project_key
                ON facts(project_id, fact_key);

            CREATE INDEX IF NOT EXISTS idx_facts_topic
                ON facts(project_id, topic, list_rank);

            -- Message identities (no transcript content)
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                external_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(chat_id, external_id)
            );

            -- FTS5 virtual table for full-text search
            CREATE VIRTUAL TABLE IF NOT EXISTS facts_fts USING fts5(
                fact_key,
                value_text,
                content='facts',
                content_rowid='rowid',
                tokenize='porter unicode61'
            );

            -- Triggers to keep FTS in sync
            CREATE TRIGGER IF NOT EXISTS facts_ai AFTER INSERT ON facts BEGIN
                INSERT INTO facts_fts(rowid, fact_key, value_text)
                VALUES (new.rowid, new.fact_key, new.value_text);
            END;

            CREATE TRIGGER IF NOT EXISTS facts_ad AFTER DELETE ON facts BEGIN
                INSERT INTO facts_fts(facts_fts, rowid, fact_key, value_text)
                VALUES ('delete', old.rowid, old.fact_key, old.value_text);
            END;

            CREATE TRIGGER IF NOT EXISTS facts_au AFTER UPDATE ON facts BEGIN
                INSERT INTO facts_fts(facts_fts, rowid, fact_key, value_text)
                VALUES ('delete', old.rowid, old.fact_key, old.value_text);
                INSERT INTO facts_fts(rowid, fact_key, value_text)
                VALUES (new.rowid, new.fact_key, new.value_text);
            END;
            "#,
        )?;

        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Get a fact by key
    pub fn get(&self, project_id: &str, fact_key: &str) -> StoreResult<Option<Fact>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT * FROM facts WHERE project_id = ?1 AND fact_key = ?2")?;
        let fact = stmt
            .query_row(params![project_id, fact_key], |row| Self::row_to_fact(row))
            .optional()?;
        Ok(fact)
    }

    /// List facts in a project, optionally below a key prefix.
    /// Ranked lists come out grouped by topic in rank order.
    pub fn list(&self, project_id: &str, prefix: Option<&str>) -> StoreResult<Vec<Fact>> {
        let conn = self.conn()?;
        let prefix = prefix.unwrap_or("").trim_end_matches('.');

        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM facts
            WHERE project_id = ?1
              AND (?2 = '' OR fact_key = ?2 OR substr(fact_key, 1, length(?2) + 1) = ?2 || '.')
            ORDER BY topic IS NOT NULL, topic, list_rank, fact_key
            "#,
        )?;

        let facts = stmt
            .query_map(params![project_id, prefix], |row| Self::row_to_fact(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(facts)
    }

    /// Escape and prepare query for FTS5
    /// Converts natural language query to FTS5 syntax with OR between words
    fn escape_fts_query(query: &str) -> String {
        let words: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .map(|w| format!("\"{}\"", w.replace('"', "\"\"")))
            .collect();

        words.join(" OR ")
    }

    /// Full-text search returning memory hits with ranked-list schema hints
    pub fn search_hits(
        &self,
        project_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<MemoryHit>> {
        let fts_query = Self::escape_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT f.*, bm25(facts_fts, 5.0, 10.0) AS bm25_score
            FROM facts f
            JOIN facts_fts ON f.rowid = facts_fts.rowid
            WHERE facts_fts MATCH ?1 AND f.project_id = ?2
            ORDER BY bm25_score
            LIMIT ?3
            "#,
        )?;

        let hits = stmt
            .query_map(params![fts_query, project_id, limit as i64], |row| {
                let fact = Self::row_to_fact(row)?;
                let bm25: f64 = row.get("bm25_score")?;
                Ok(Self::fact_to_hit(fact, bm25))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    fn fact_to_hit(fact: Fact, bm25: f64) -> MemoryHit {
        // bm25() is negative, more negative is better; squash into (0, 1)
        let strength = (-bm25).max(0.0);
        let score = (strength / (1.0 + strength)) as f32;

        let mut hit = MemoryHit::new(fact.id.to_string(), describe_fact(&fact), score)
            .with_source_type(SourceType::Fact)
            .with_created_at(fact.updated_at)
            .with_metadata(HINT_FACT_KEY, fact.fact_key.clone())
            .with_metadata("value_type", fact.value_type.to_string());
        hit.message_id = fact.source_message_id.clone();

        if let Some((topic, rank)) = fact.ranked_position() {
            hit = hit
                .with_metadata(HINT_TOPIC, topic)
                .with_metadata("rank", Value::from(rank));
        }
        hit
    }

    /// Get database statistics for a project
    pub fn stats(&self, project_id: &str) -> StoreResult<StorageStats> {
        let conn = self.conn()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM facts WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?;

        let ranked: i64 = conn.query_row(
            "SELECT COUNT(*) FROM facts WHERE project_id = ?1 AND topic IS NOT NULL",
            [project_id],
            |row| row.get(0),
        )?;

        let topics: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT topic) FROM facts WHERE project_id = ?1 AND topic IS NOT NULL",
            [project_id],
            |row| row.get(0),
        )?;

        let messages: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;

        Ok(StorageStats {
            total_facts: total as usize,
            ranked_facts: ranked as usize,
            topics: topics as usize,
            all_messages: messages as usize,
        })
    }

    /// Convert a database row to a Fact
    fn row_to_fact(row: &rusqlite::Row) -> rusqlite::Result<Fact> {
        let id_str: String = row.get("id")?;
        let type_str: String = row.get("value_type")?;
        let created_str: String = row.get("created_at")?;
        let updated_str: String = row.get("updated_at")?;

        Ok(Fact {
            id: Ulid::from_string(&id_str).unwrap_or_else(|_| Ulid::new()),
            project_id: row.get("project_id")?,
            fact_key: row.get("fact_key")?,
            value_text: row.get("value_text")?,
            value_type: type_str.parse().unwrap_or_default(),
            confidence: row.get::<_, f64>("confidence")? as f32,
            source_message_id: row.get("source_message_id")?,
            created_at: parse_ts(&created_str),
            updated_at: parse_ts(&updated_str),
        })
    }

    /// Run `f` inside an immediate (write-locked) transaction
    fn write_tx<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl FactStore for Storage {
    fn store_or_update(&self, fact: &Fact) -> StoreResult<StoreOutcome> {
        validate_key(&fact.fact_key)?;
        self.write_tx(|tx| upsert(tx, fact))
    }

    fn append_ranked(&self, write: &RankedWrite) -> StoreResult<StoreOutcome> {
        let topic = canonicalize(&write.topic);
        self.write_tx(|tx| {
            let rows = load_list(tx, &write.project_id, &topic)?;

            if let Some(existing) = rows.iter().find(|r| same_value(&r.value, &write.value)) {
                debug!(topic = %topic, rank = existing.rank, "value already in list");
                return Ok(StoreOutcome {
                    fact_id: existing.id,
                    fact_key: ranked_key(&topic, existing.rank),
                    action: StoreAction::Noop,
                });
            }

            let next_rank = rows.iter().map(|r| r.rank).max().unwrap_or(0) + 1;
            let write = RankedWrite {
                topic: topic.clone(),
                ..write.clone()
            };
            upsert(tx, &write.to_fact(next_rank))
        })
    }

    fn promote_ranked(&self, write: &RankedWrite, rank: u32) -> StoreResult<Vec<StoreOutcome>> {
        let topic = canonicalize(&write.topic);
        let target = rank.max(1);

        self.write_tx(|tx| {
            let rows = load_list(tx, &write.project_id, &topic)?;
            let plan = plan_promotion(&rows, write, target);

            let mut outcomes = Vec::new();
            for (slot, item) in plan {
                let current = rows.iter().find(|r| r.rank == slot);
                if current.is_some_and(|r| r.value == item.value) {
                    continue;
                }

                let fact = Fact::ranked(&write.project_id, &topic, slot, item.value)
                    .with_confidence(item.confidence)
                    .with_source_message(item.source_message_id);
                outcomes.push(upsert(tx, &fact)?);
            }
            Ok(outcomes)
        })
    }

    fn get_ranked_list(&self, project_id: &str, topic: &str) -> StoreResult<Vec<RankedEntry>> {
        let topic = canonicalize(topic);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT list_rank, value_text FROM facts
             WHERE project_id = ?1 AND topic = ?2
             ORDER BY list_rank ASC",
        )?;

        let entries = stmt
            .query_map(params![project_id, topic], |row| {
                Ok(RankedEntry {
                    rank: row.get::<_, i64>(0)? as u32,
                    value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn recent_ranked_topics(&self, project_id: &str, limit: usize) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT topic, MAX(updated_at) AS last_update FROM facts
             WHERE project_id = ?1 AND topic IS NOT NULL
             GROUP BY topic
             ORDER BY last_update DESC, topic ASC
             LIMIT ?2",
        )?;

        let topics = stmt
            .query_map(params![project_id, limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(topics)
    }

    fn clear(&self, project_id: &str, scope: &ClearScope) -> StoreResult<usize> {
        self.write_tx(|tx| {
            let deleted = match scope {
                ClearScope::All => {
                    tx.execute("DELETE FROM facts WHERE project_id = ?1", [project_id])?
                }
                ClearScope::Prefix(prefix) => {
                    let prefix = prefix.trim_end_matches('.');
                    tx.execute(
                        "DELETE FROM facts WHERE project_id = ?1
                           AND (fact_key = ?2 OR substr(fact_key, 1, length(?2) + 1) = ?2 || '.')",
                        params![project_id, prefix],
                    )?
                }
                ClearScope::Topic(topic) => tx.execute(
                    "DELETE FROM facts WHERE project_id = ?1 AND topic = ?2",
                    params![project_id, canonicalize(topic)],
                )?,
            };
            debug!(project_id, ?scope, deleted, "cleared facts");
            Ok(deleted)
        })
    }
}

impl MessageIdentity for Storage {
    fn get_or_create(&self, chat_id: &str, message_id: Option<&str>) -> StoreResult<String> {
        let chat_id = chat_id.trim();
        if chat_id.is_empty() {
            return Err(StoreError::Identity("chat id is empty".to_string()));
        }

        let external_id = match message_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Ulid::new().to_string(),
        };

        self.write_tx(|tx| {
            tx.execute(
                "INSERT INTO messages (id, chat_id, external_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id, external_id) DO NOTHING",
                params![Ulid::new().to_string(), chat_id, external_id, ts(Utc::now())],
            )?;

            let id: String = tx.query_row(
                "SELECT id FROM messages WHERE chat_id = ?1 AND external_id = ?2",
                params![chat_id, external_id],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }
}

/// A stored list row
struct ListRow {
    id: Ulid,
    rank: u32,
    value: String,
    confidence: f32,
    source_message_id: Option<String>,
}

/// A value travelling to a new slot during promotion
struct Placed {
    value: String,
    confidence: f32,
    source_message_id: Option<String>,
}

fn load_list(conn: &Connection, project_id: &str, topic: &str) -> StoreResult<Vec<ListRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, list_rank, value_text, confidence, source_message_id FROM facts
         WHERE project_id = ?1 AND topic = ?2
         ORDER BY list_rank ASC",
    )?;

    let rows = stmt
        .query_map(params![project_id, topic], |row| {
            let id: String = row.get(0)?;
            Ok(ListRow {
                id: Ulid::from_string(&id).unwrap_or_else(|_| Ulid::new()),
                rank: row.get::<_, i64>(1)? as u32,
                value: row.get(2)?,
                confidence: row.get::<_, f64>(3)? as f32,
                source_message_id: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Decide which value ends up in which rank slot.
///
/// - value new, target free: just the target slot
/// - value new, target taken: occupants from the target up to the first free
///   rank move down one
/// - value already listed: reorder within the occupied ranks
fn plan_promotion(rows: &[ListRow], write: &RankedWrite, target: u32) -> Vec<(u32, Placed)> {
    let incoming = Placed {
        value: write.value.clone(),
        confidence: write.confidence,
        source_message_id: write.source_message_id.clone(),
    };

    let existing = rows.iter().position(|r| same_value(&r.value, &write.value));
    let occupied = |rank: u32| rows.iter().any(|r| r.rank == rank);

    if existing.is_none() && !occupied(target) {
        return vec![(target, incoming)];
    }

    let mut slots: Vec<u32> = rows.iter().map(|r| r.rank).collect();
    let mut order: Vec<Placed> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != existing)
        .map(|(_, r)| Placed {
            value: r.value.clone(),
            confidence: r.confidence,
            source_message_id: r.source_message_id.clone(),
        })
        .collect();

    if existing.is_none() {
        let mut free = target + 1;
        while occupied(free) {
            free += 1;
        }
        slots.push(free);
        slots.sort_unstable();
    }

    let index = rows
        .iter()
        .enumerate()
        .filter(|(i, r)| Some(*i) != existing && r.rank < target)
        .count();
    order.insert(index.min(order.len()), incoming);

    slots.into_iter().zip(order).collect()
}

/// Store-or-update inside an open transaction
fn upsert(conn: &Connection, fact: &Fact) -> StoreResult<StoreOutcome> {
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT id, value_text FROM facts WHERE project_id = ?1 AND fact_key = ?2",
            params![fact.project_id, fact.fact_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let now = ts(Utc::now());

    match existing {
        None => {
            let (topic, rank) = match parse_ranked_key(&fact.fact_key) {
                Some((topic, rank)) => (Some(topic), Some(rank as i64)),
                None => (None, None),
            };

            conn.execute(
                r#"
                INSERT INTO facts (
                    id, project_id, fact_key, value_text, value_type, confidence,
                    source_message_id, topic, list_rank, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                "#,
                params![
                    fact.id.to_string(),
                    fact.project_id,
                    fact.fact_key,
                    fact.value_text,
                    fact.value_type.to_string(),
                    fact.confidence as f64,
                    fact.source_message_id,
                    topic,
                    rank,
                    now,
                ],
            )?;

            Ok(StoreOutcome {
                fact_id: fact.id,
                fact_key: fact.fact_key.clone(),
                action: StoreAction::Store,
            })
        }
        Some((id, value)) => {
            let fact_id = Ulid::from_string(&id).unwrap_or(fact.id);
            if value == fact.value_text {
                return Ok(StoreOutcome {
                    fact_id,
                    fact_key: fact.fact_key.clone(),
                    action: StoreAction::Noop,
                });
            }

            conn.execute(
                r#"
                UPDATE facts
                SET value_text = ?2, value_type = ?3, confidence = ?4,
                    source_message_id = ?5, updated_at = ?6
                WHERE id = ?1
                "#,
                params![
                    id,
                    fact.value_text,
                    fact.value_type.to_string(),
                    fact.confidence as f64,
                    fact.source_message_id,
                    now,
                ],
            )?;

            Ok(StoreOutcome {
                fact_id,
                fact_key: fact.fact_key.clone(),
                action: StoreAction::Update,
            })
        }
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let well_formed = !key.is_empty()
        && !key.starts_with('.')
        && !key.ends_with('.')
        && !key.contains("..")
        && !key.chars().any(char::is_whitespace);

    if well_formed {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn same_value(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Fixed-width RFC 3339 so timestamps sort lexicographically
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Human-readable line for a fact, used as hit content
fn describe_fact(fact: &Fact) -> String {
    match fact.ranked_position() {
        Some((topic, rank)) => format!(
            "favorite {} #{}: {}",
            topic.replace('_', " "),
            rank,
            fact.value_text
        ),
        None => format!("{}: {}", fact.fact_key, fact.value_text),
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_facts: usize,
    pub ranked_facts: usize,
    pub topics: usize,
    /// Message identities are keyed by chat, so this counts every project
    pub all_messages: usize,
}
