//! SQLite persistence for booking rows and lookup tables.
//!
//! Rows are stored raw, as exported. Resolution and activity parsing happen
//! on read, so re-importing a lookup table changes every booking at once.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::lookup::{LookupKind, LookupResolver, LookupTable};
use crate::models::{Booking, BookingInput};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown lookup table '{0}'")]
    UnknownLookup(String),
}

pub struct BookingStore {
    conn: Connection,
}

impl BookingStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                family_name TEXT,
                arrival TEXT,
                tour_operator TEXT,
                booked_activity TEXT,
                hotel TEXT,
                country TEXT,
                imported_at TEXT NOT NULL
            );",
        )?;
        for kind in LookupKind::ALL {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, name TEXT NOT NULL);",
                kind.table_name()
            ))?;
        }
        Ok(())
    }

    pub fn insert_booking(&self, input: &BookingInput) -> Result<i64, StoreError> {
        insert_row(&self.conn, input, Utc::now())?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert all rows in one transaction; returns how many were written.
    pub fn insert_bookings(&mut self, inputs: &[BookingInput]) -> Result<usize, StoreError> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        for input in inputs {
            insert_row(&tx, input, now)?;
        }
        tx.commit()?;
        Ok(inputs.len())
    }

    /// Raw rows in insertion order.
    pub fn raw_bookings(&self) -> Result<Vec<(i64, BookingInput)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, family_name, arrival, tour_operator, booked_activity, hotel, country
             FROM bookings ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    BookingInput {
                        name: row.get(1)?,
                        family_name: row.get(2)?,
                        arrival: row.get(3)?,
                        tour_operator: row.get(4)?,
                        booked_activity: row.get(5)?,
                        hotel: row.get(6)?,
                        country: row.get(7)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn imported_at(&self, id: i64) -> Result<Option<DateTime<Utc>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT imported_at FROM bookings WHERE id = ?1")?;
        let mut rows = stmt.query_map([id], |row| row.get::<_, DateTime<Utc>>(0))?;
        Ok(rows.next().transpose()?)
    }

    /// Replace the contents of one lookup table.
    pub fn replace_lookup(
        &mut self,
        kind: LookupKind,
        entries: &[(String, String)],
    ) -> Result<usize, StoreError> {
        let table = kind.table_name();
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", table), [])?;
        {
            let mut stmt =
                tx.prepare(&format!("INSERT OR REPLACE INTO {} (id, name) VALUES (?1, ?2)", table))?;
            for (id, name) in entries {
                stmt.execute(params![id.trim(), name])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    pub fn lookup_table(&self, kind: LookupKind) -> Result<LookupTable, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {}", kind.table_name()))?;
        let entries = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LookupTable::new(entries))
    }

    pub fn resolver(&self) -> Result<LookupResolver, StoreError> {
        let mut resolver = LookupResolver::new();
        for kind in LookupKind::ALL {
            resolver = resolver.with_table(kind, self.lookup_table(kind)?);
        }
        Ok(resolver)
    }

    /// Every booking, resolved and enriched.
    pub fn bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let resolver = self.resolver()?;
        Ok(self
            .raw_bookings()?
            .iter()
            .map(|(id, input)| resolver.enrich(Some(*id), input))
            .collect())
    }
}

fn insert_row(conn: &Connection, input: &BookingInput, now: DateTime<Utc>) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO bookings
            (name, family_name, arrival, tour_operator, booked_activity, hotel, country, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            input.name,
            input.family_name,
            input.arrival,
            input.tour_operator,
            input.booked_activity,
            input.hotel,
            input.country,
            now,
        ],
    )?;
    Ok(())
}

/// Default database location when none is configured.
pub fn default_db_path() -> PathBuf {
    PathBuf::from("data/bookings.db")
}
