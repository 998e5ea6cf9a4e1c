//! SQLite-backed secondary index over each record's `index_fields()`.
//!
//! The canonical data lives in the JSON snapshot (`Store`) and the JSONL
//! history (`JsonlLog`); this index exists purely to answer `Filter` queries
//! without a linear scan once a collection grows large. It is rebuilt
//! wholesale from in-memory records on `Store::open` and on every mutation,
//! so losing or corrupting the `.sqlite3` file is never a correctness issue -
//! only a performance one. `rebuild` is idempotent.

use rusqlite::{Connection, params};
use std::collections::HashSet;

use crate::filter::{Filter, FilterOp, IndexValue};

pub struct SecondaryIndex {
    conn: Connection,
}

impl SecondaryIndex {
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_file(path: &std::path::Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (collection, id, field)
            );
            CREATE INDEX IF NOT EXISTS idx_lookup ON records(collection, field, value);",
        )
    }

    /// Replace all indexed fields for one record.
    pub fn put(&self, collection: &str, id: &str, fields: &[(&'static str, IndexValue)]) -> rusqlite::Result<()> {
        self.conn
            .execute("DELETE FROM records WHERE collection = ?1 AND id = ?2", params![collection, id])?;
        for (field, value) in fields {
            self.conn.execute(
                "INSERT INTO records (collection, id, field, value) VALUES (?1, ?2, ?3, ?4)",
                params![collection, id, field, value.as_text()],
            )?;
        }
        Ok(())
    }

    pub fn remove(&self, collection: &str, id: &str) -> rusqlite::Result<()> {
        self.conn
            .execute("DELETE FROM records WHERE collection = ?1 AND id = ?2", params![collection, id])?;
        Ok(())
    }

    pub fn clear_collection(&self, collection: &str) -> rusqlite::Result<()> {
        self.conn
            .execute("DELETE FROM records WHERE collection = ?1", params![collection])?;
        Ok(())
    }

    /// Return ids in `collection` matching all filters (AND semantics).
    pub fn query(&self, collection: &str, filters: &[Filter]) -> rusqlite::Result<Vec<String>> {
        if filters.is_empty() {
            let mut stmt = self
                .conn
                .prepare("SELECT DISTINCT id FROM records WHERE collection = ?1")?;
            let rows = stmt.query_map(params![collection], |r| r.get::<_, String>(0))?;
            return rows.collect();
        }

        let mut result: Option<HashSet<String>> = None;
        for f in filters {
            let sql = match f.op {
                FilterOp::Eq => "SELECT id FROM records WHERE collection = ?1 AND field = ?2 AND value = ?3",
                FilterOp::Ne => "SELECT id FROM records WHERE collection = ?1 AND field = ?2 AND value != ?3",
            };
            let mut stmt = self.conn.prepare(sql)?;
            let rows = stmt.query_map(params![collection, f.field, f.value.as_text()], |r| r.get::<_, String>(0))?;
            let ids: HashSet<String> = rows.collect::<rusqlite::Result<_>>()?;
            result = Some(match result {
                None => ids,
                Some(prev) => prev.intersection(&ids).cloned().collect(),
            });
        }
        Ok(result.unwrap_or_default().into_iter().collect())
    }
}
