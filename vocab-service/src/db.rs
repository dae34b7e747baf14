//! SQLite storage for vocab entries.

use chrono::{DateTime, Local, TimeZone};
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use vocab_types::{NewVocab, VocabEntry};

pub const MEMORY_PATH: &str = ":memory:";

const ENTRY_COLUMNS: &str = "id, term, translation, knowledge_level, practice_at";

pub struct Db {
    conn: Mutex<Connection>,
}

/// How the term and translation searches combine when both are given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct VocabFilter {
    pub term: Option<String>,
    pub translation: Option<String>,
    pub mode: MatchMode,
    /// Only entries with `practice_at` strictly before this instant.
    pub due_before: Option<DateTime<Local>>,
}

impl VocabFilter {
    pub fn due_before(instant: DateTime<Local>) -> Self {
        Self {
            due_before: Some(instant),
            ..Self::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = vec!["1=1".to_string()];
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        let term = self.term.as_deref().filter(|s| !s.is_empty());
        let translation = self.translation.as_deref().filter(|s| !s.is_empty());

        match (term, translation) {
            (Some(term), Some(translation)) => {
                let joiner = match self.mode {
                    MatchMode::All => "AND",
                    MatchMode::Any => "OR",
                };
                conditions.push(format!(
                    "(term LIKE ?{} {} translation LIKE ?{})",
                    params.len() + 1,
                    joiner,
                    params.len() + 2
                ));
                params.push(Box::new(like(term)));
                params.push(Box::new(like(translation)));
            }
            (Some(term), None) => {
                conditions.push(format!("term LIKE ?{}", params.len() + 1));
                params.push(Box::new(like(term)));
            }
            (None, Some(translation)) => {
                conditions.push(format!("translation LIKE ?{}", params.len() + 1));
                params.push(Box::new(like(translation)));
            }
            (None, None) => {}
        }

        if let Some(instant) = self.due_before {
            conditions.push(format!("practice_at < ?{}", params.len() + 1));
            params.push(Box::new(ceil_seconds(&instant)));
        }

        (conditions.join(" AND "), params)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VocabOrder {
    #[default]
    Term,
    KnowledgeLevel,
    KnowledgeLevelDesc,
    PracticeAt,
    PracticeAtDesc,
}

impl VocabOrder {
    /// Unknown values sort by term.
    pub fn from_param(value: &str) -> Self {
        match value {
            "knowledge_level" => Self::KnowledgeLevel,
            "knowledge_level_desc" => Self::KnowledgeLevelDesc,
            "practice_at" => Self::PracticeAt,
            "practice_at_desc" => Self::PracticeAtDesc,
            _ => Self::Term,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::Term => "term, id",
            Self::KnowledgeLevel => "knowledge_level, term, id",
            Self::KnowledgeLevelDesc => "knowledge_level DESC, term, id",
            Self::PracticeAt => "practice_at, term, id",
            Self::PracticeAtDesc => "practice_at DESC, term, id",
        }
    }
}

/// Store handle handed to the closure of [`Db::transaction`].
pub struct VocabTx<'a> {
    conn: &'a Connection,
}

impl VocabTx<'_> {
    pub fn create(&self, vocab: &NewVocab) -> SqliteResult<i64> {
        insert_vocab(self.conn, vocab)
    }

    pub fn delete_all(&self) -> SqliteResult<usize> {
        delete_all_vocab(self.conn)
    }
}

impl Db {
    /// Opens the database file at `path`; `:memory:` opens an in-memory one.
    pub fn open(path: impl AsRef<Path>) -> SqliteResult<Self> {
        let path = path.as_ref();
        let conn = if path == Path::new(MEMORY_PATH) {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_tables(&self) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS vocab (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                term TEXT NOT NULL,
                translation TEXT NOT NULL,
                knowledge_level INTEGER NOT NULL DEFAULT 0,
                practice_at INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_vocab_practice_at ON vocab(practice_at)",
            [],
        )?;
        Ok(())
    }

    pub fn create(&self, vocab: &NewVocab) -> SqliteResult<i64> {
        let conn = self.conn();
        insert_vocab(&conn, vocab)
    }

    pub fn find_by_id(&self, id: i64) -> SqliteResult<Option<VocabEntry>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM vocab WHERE id = ?1", ENTRY_COLUMNS),
            [id],
            row_to_entry,
        )
        .optional()
    }

    /// One page of matching entries together with the total match count.
    pub fn find_all(
        &self,
        filter: &VocabFilter,
        order: VocabOrder,
        offset: i64,
        limit: i64,
    ) -> SqliteResult<(Vec<VocabEntry>, i64)> {
        let conn = self.conn();
        let (clause, params) = filter.where_clause();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM vocab WHERE {}", clause),
            param_refs.as_slice(),
            |r| r.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM vocab WHERE {} ORDER BY {} LIMIT {} OFFSET {}",
            ENTRY_COLUMNS,
            clause,
            order.sql(),
            limit.max(0),
            offset.max(0)
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(param_refs.as_slice(), row_to_entry)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok((items, total))
    }

    /// Every entry in insertion order.
    pub fn find_every(&self) -> SqliteResult<Vec<VocabEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM vocab ORDER BY id", ENTRY_COLUMNS))?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn count(&self, filter: &VocabFilter) -> SqliteResult<i64> {
        let conn = self.conn();
        let (clause, params) = filter.where_clause();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM vocab WHERE {}", clause),
            param_refs.as_slice(),
            |r| r.get(0),
        )
    }

    /// Writes the level and next practice date of `entry`. Returns false when
    /// the id no longer exists.
    pub fn update_progress(&self, entry: &VocabEntry) -> SqliteResult<bool> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE vocab SET knowledge_level = ?1, practice_at = ?2 WHERE id = ?3",
            rusqlite::params![entry.knowledge_level, entry.practice_at.timestamp(), entry.id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_by_id(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn();
        let changed = conn.execute("DELETE FROM vocab WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Runs `work` inside a single SQLite transaction. The transaction commits
    /// when `work` returns `Ok` and rolls back on `Err`.
    pub fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&VocabTx<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let out = work(&VocabTx { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

fn insert_vocab(conn: &Connection, vocab: &NewVocab) -> SqliteResult<i64> {
    conn.execute(
        "INSERT INTO vocab (term, translation, knowledge_level, practice_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            vocab.term,
            vocab.translation,
            vocab.knowledge_level,
            vocab.practice_at.timestamp()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn delete_all_vocab(conn: &Connection) -> SqliteResult<usize> {
    conn.execute("DELETE FROM vocab", [])
}

fn like(s: &str) -> String {
    format!("%{}%", s)
}

// =====================================================
// Row Mapping Functions
// =====================================================

/// Stored instants are whole seconds, so a fractional bound rounds up.
fn ceil_seconds(instant: &DateTime<Local>) -> i64 {
    instant.timestamp() + i64::from(instant.timestamp_subsec_nanos() > 0)
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<VocabEntry> {
    let practice_at: i64 = row.get(4)?;
    Ok(VocabEntry {
        id: row.get(0)?,
        term: row.get(1)?,
        translation: row.get(2)?,
        knowledge_level: row.get(3)?,
        practice_at: Local
            .timestamp_opt(practice_at, 0)
            .single()
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, practice_at))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::in_days;
    use chrono::TimeDelta;

    fn memory_db() -> Db {
        Db::open(":memory:").unwrap()
    }

    fn vocab(term: &str, translation: &str, level: u8, days: i64) -> NewVocab {
        NewVocab {
            term: term.to_string(),
            translation: translation.to_string(),
            knowledge_level: level,
            practice_at: in_days(days),
        }
    }

    fn terms(entries: &[VocabEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.term.as_str()).collect()
    }

    #[test]
    fn test_create_and_find_by_id() {
        let db = memory_db();
        let id = db.create(&vocab("foo", "bar", 3, 2)).unwrap();

        let entry = db.find_by_id(id).unwrap().unwrap();
        assert_eq!(entry.term, "foo");
        assert_eq!(entry.translation, "bar");
        assert_eq!(entry.knowledge_level, 3);
        assert_eq!(entry.practice_at, in_days(2));

        assert!(db.find_by_id(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_find_all_pages_and_counts() {
        let db = memory_db();
        for i in 0..10 {
            db.create(&vocab(&format!("foo{}", i), "bar", 1, 1)).unwrap();
        }

        let (items, total) = db
            .find_all(&VocabFilter::default(), VocabOrder::Term, 3, 2)
            .unwrap();
        assert_eq!(total, 10);
        assert_eq!(terms(&items), vec!["foo3", "foo4"]);
    }

    #[test]
    fn test_search_modes() {
        let db = memory_db();
        db.create(&vocab("guten tag", "good day", 1, 1)).unwrap();
        db.create(&vocab("apfel kuchen", "apple cake", 1, 1)).unwrap();

        let mut filter = VocabFilter {
            term: Some("guten".to_string()),
            ..VocabFilter::default()
        };
        assert_eq!(db.count(&filter).unwrap(), 1);

        filter.translation = Some("apple cake".to_string());
        assert_eq!(db.count(&filter).unwrap(), 0);

        filter.mode = MatchMode::Any;
        let (items, total) = db.find_all(&filter, VocabOrder::Term, 0, 10).unwrap();
        assert_eq!(total, 2);
        assert_eq!(terms(&items), vec!["apfel kuchen", "guten tag"]);
    }

    #[test]
    fn test_orderings() {
        let db = memory_db();
        db.create(&vocab("foo1", "bar1", 3, 2)).unwrap();
        db.create(&vocab("foo2", "bar2", 5, 4)).unwrap();
        db.create(&vocab("foo3", "bar3", 1, 3)).unwrap();

        let order_of = |order: VocabOrder| {
            let (items, _) = db.find_all(&VocabFilter::default(), order, 0, 10).unwrap();
            items.into_iter().map(|e| e.term).collect::<Vec<_>>()
        };

        assert_eq!(order_of(VocabOrder::KnowledgeLevel), vec!["foo3", "foo1", "foo2"]);
        assert_eq!(order_of(VocabOrder::KnowledgeLevelDesc), vec!["foo2", "foo1", "foo3"]);
        assert_eq!(order_of(VocabOrder::PracticeAt), vec!["foo1", "foo3", "foo2"]);
        assert_eq!(order_of(VocabOrder::PracticeAtDesc), vec!["foo2", "foo3", "foo1"]);
    }

    #[test]
    fn test_order_from_param() {
        assert_eq!(VocabOrder::from_param("practice_at_desc"), VocabOrder::PracticeAtDesc);
        assert_eq!(VocabOrder::from_param("knowledge_level"), VocabOrder::KnowledgeLevel);
        assert_eq!(VocabOrder::from_param("bogus"), VocabOrder::Term);
    }

    #[test]
    fn test_due_before_is_strict() {
        let db = memory_db();
        db.create(&vocab("today", "x", 0, 0)).unwrap();
        db.create(&vocab("yesterday", "x", 0, -1)).unwrap();
        db.create(&vocab("tomorrow", "x", 0, 1)).unwrap();

        assert_eq!(db.count(&VocabFilter::due_before(in_days(0))).unwrap(), 1);
        assert_eq!(db.count(&VocabFilter::due_before(Local::now())).unwrap(), 2);
    }

    #[test]
    fn test_due_before_within_the_same_second() {
        let db = memory_db();
        let now = Local.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
        db.create(&NewVocab {
            term: "jetzt".to_string(),
            translation: "now".to_string(),
            knowledge_level: 0,
            practice_at: now - TimeDelta::milliseconds(1),
        })
        .unwrap();

        assert_eq!(db.count(&VocabFilter::due_before(now)).unwrap(), 1);

        let whole = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(db.count(&VocabFilter::due_before(whole)).unwrap(), 0);
    }

    #[test]
    fn test_update_and_delete() {
        let db = memory_db();
        let id = db.create(&vocab("foo", "bar", 0, 0)).unwrap();

        let mut entry = db.find_by_id(id).unwrap().unwrap();
        entry.knowledge_level = 4;
        entry.practice_at = in_days(8);
        assert!(db.update_progress(&entry).unwrap());
        assert_eq!(db.find_by_id(id).unwrap().unwrap(), entry);

        assert!(db.delete_by_id(id).unwrap());
        assert!(!db.delete_by_id(id).unwrap());
        entry.id = 999;
        assert!(!db.update_progress(&entry).unwrap());
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = memory_db();
        db.create(&vocab("old", "x", 0, 0)).unwrap();

        let created: SqliteResult<usize> = db.transaction(|tx| {
            tx.delete_all()?;
            tx.create(&vocab("new1", "x", 0, 0))?;
            tx.create(&vocab("new2", "x", 0, 0))?;
            Ok(2)
        });
        assert_eq!(created.unwrap(), 2);
        assert_eq!(terms(&db.find_every().unwrap()), vec!["new1", "new2"]);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        #[derive(Debug)]
        enum Failure {
            Store,
            Stop,
        }
        impl From<rusqlite::Error> for Failure {
            fn from(_: rusqlite::Error) -> Self {
                Failure::Store
            }
        }

        let db = memory_db();
        db.create(&vocab("old", "x", 0, 0)).unwrap();

        let result: Result<(), Failure> = db.transaction(|tx| {
            tx.delete_all()?;
            tx.create(&vocab("new", "x", 0, 0))?;
            Err(Failure::Stop)
        });
        assert!(matches!(result, Err(Failure::Stop)));
        assert_eq!(terms(&db.find_every().unwrap()), vec!["old"]);
    }

    #[test]
    fn test_delete_all_in_transaction() {
        let db = memory_db();
        db.create(&vocab("a", "x", 0, 0)).unwrap();
        db.create(&vocab("b", "x", 0, 0)).unwrap();
        let removed: SqliteResult<usize> = db.transaction(|tx| tx.delete_all());
        assert_eq!(removed.unwrap(), 2);
        assert_eq!(db.count(&VocabFilter::default()).unwrap(), 0);
    }
}
