//! Record store for users and their audio submissions
//!
//! Uses SQLite to persist which users we have seen and the sequential
//! names assigned to their voice messages.

use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Lock error")]
    LockError,
}

/// A freshly allocated audio record
#[derive(Debug, Clone)]
pub struct AudioRecord {
    /// Display name, `audio_message_<n>`
    pub name: String,
    /// Where the WAV file will be written
    pub path: PathBuf,
}

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize database tables
    fn init(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS Users (
                u_id INTEGER PRIMARY KEY NOT NULL,
                u_joined DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS Audios (
                a_id CHAR(36) PRIMARY KEY NOT NULL,
                a_name VARCHAR,
                a_path VARCHAR,
                a_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                u_id INTEGER,
                FOREIGN KEY (u_id) REFERENCES Users (u_id) ON DELETE SET NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Register a user if not already present (idempotent)
    pub fn upsert_user(&self, user_id: u64) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        conn.execute("INSERT OR IGNORE INTO Users (u_id) VALUES (?)", [user_id])?;
        Ok(())
    }

    /// Allocate the next sequential audio record for a user.
    ///
    /// Runs as a single transaction while holding the connection lock, so
    /// two overlapping submissions from the same user cannot both observe
    /// the same count. Returns the assigned name and target path.
    pub fn create_audio_record(
        &self,
        user_id: u64,
        base_dir: &Path,
    ) -> Result<AudioRecord, DatabaseError> {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        let tx = conn.transaction()?;

        tx.execute("INSERT OR IGNORE INTO Users (u_id) VALUES (?)", [user_id])?;

        let count: u64 = tx.query_row(
            "SELECT COUNT(*) FROM Audios WHERE u_id = ?",
            [user_id],
            |row| row.get(0),
        )?;

        let name = format!("audio_message_{count}");
        let path = base_dir
            .join(user_id.to_string())
            .join(format!("{name}.wav"));
        let audio_id = Uuid::new_v4().to_string();
        let path_text = path.to_string_lossy().into_owned();

        tx.execute(
            "INSERT INTO Audios (a_id, a_name, a_path, u_id) VALUES (?, ?, ?, ?)",
            params![audio_id, name, path_text, user_id],
        )?;
        tx.commit()?;

        Ok(AudioRecord { name, path })
    }

    /// Number of audio records stored for a user (0 for unknown users)
    pub fn count_audios(&self, user_id: u64) -> Result<u64, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockError)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM Audios WHERE u_id = ?",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sequential_names() {
        let db = Database::open(":memory:").unwrap();
        let base = Path::new("data/audio_data");

        let first = db.create_audio_record(42, base).unwrap();
        assert_eq!(first.name, "audio_message_0");
        assert_eq!(first.path, base.join("42").join("audio_message_0.wav"));

        let second = db.create_audio_record(42, base).unwrap();
        assert_eq!(second.name, "audio_message_1");

        // Other users get their own sequence
        let other = db.create_audio_record(7, base).unwrap();
        assert_eq!(other.name, "audio_message_0");
    }

    #[test]
    fn test_count_audios() {
        let db = Database::open(":memory:").unwrap();
        assert_eq!(db.count_audios(1).unwrap(), 0);

        for _ in 0..3 {
            db.create_audio_record(1, Path::new("data")).unwrap();
        }
        assert_eq!(db.count_audios(1).unwrap(), 3);
        assert_eq!(db.count_audios(2).unwrap(), 0);
    }

    #[test]
    fn test_upsert_user_idempotent() {
        let db = Database::open(":memory:").unwrap();
        db.upsert_user(5).unwrap();
        db.upsert_user(5).unwrap();

        let conn = db.conn.lock().unwrap();
        let users: u64 = conn
            .query_row("SELECT COUNT(*) FROM Users WHERE u_id = 5", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(users, 1);
    }

    #[test]
    fn test_concurrent_allocation_gets_distinct_names() {
        let db = Arc::new(Database::open(":memory:").unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    db.create_audio_record(99, Path::new("data")).unwrap().name
                })
            })
            .collect();

        let mut names: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        assert_eq!(db.count_audios(99).unwrap(), 8);
    }
}
