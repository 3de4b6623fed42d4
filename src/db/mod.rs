//! SQLite store of games and the positions they pass through.
//!
//! Layout:
//! - `games` holds one row per stored game, unique on `game_hash`.
//! - `games_duplicates` keeps hash collisions with their real hash.
//! - `positions_<n>` holds `(game_id, position_hash)` pairs of bucket `n`.
//! - `description` carries a free text and a format version.
//!
//! Indexes are only created once bulk loading is over, see
//! [`Database::create_indexes`] and [`Database::create_extra_indexes`].

pub mod buckets;
pub mod encoding;
pub mod ops;
pub mod search;
pub mod session;

use std::path::{Path, PathBuf};

use log::info;
use rusqlite::{params, Connection, OpenFlags};
use shakmaty::{san::SanPlus, Chess};

pub use buckets::{bucket_table, split_hash, Buckets};
pub use ops::{GameRecord, Recorded};
pub use session::{DiscardReason, IngestSession, IngestStats, InsertOutcome};

use crate::error::{Error, Result};

const DESCRIPTION: &str = "Description of database goes here";
const FORMAT_VERSION: i64 = 1;

pub(crate) fn schema_sql(nbr_buckets: usize) -> String {
    let mut sql = String::from(
        r#"
        CREATE TABLE IF NOT EXISTS description (
            text TEXT,
            version INTEGER
        );
        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER,
            game_hash INTEGER UNIQUE,
            white TEXT,
            black TEXT,
            event TEXT,
            site TEXT,
            result TEXT,
            date TEXT,
            white_elo INTEGER,
            black_elo INTEGER,
            moves BLOB
        );
        CREATE TABLE IF NOT EXISTS games_duplicates (
            game_id INTEGER,
            game_hash INTEGER,
            white TEXT,
            black TEXT,
            event TEXT,
            site TEXT,
            result TEXT,
            date TEXT,
            white_elo INTEGER,
            black_elo INTEGER,
            moves BLOB
        );
        "#,
    );
    for bucket in 0..nbr_buckets {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (game_id INTEGER, position_hash INTEGER);\n",
            bucket_table(bucket)
        ));
    }
    sql
}

pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    nbr_buckets: usize,
}

impl Database {
    /// Opens an existing database, or an empty file if none exists yet.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Creates a new database file. Fails if `path` already exists.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::DatabaseExists(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        // bulk loads are journaled by our own transactions only
        conn.execute_batch("PRAGMA synchronous = OFF; PRAGMA temp_store = MEMORY;")?;
        let nbr_buckets: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'positions\\_%' ESCAPE '\\'",
            [],
            |row| row.get(0),
        )?;
        Ok(Self {
            conn,
            path,
            nbr_buckets: nbr_buckets as usize,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Number of position tables, zero before [`Database::create_tables`].
    pub fn nbr_buckets(&self) -> usize {
        self.nbr_buckets
    }

    pub fn create_tables(&mut self, nbr_buckets: usize) -> Result<()> {
        info!("Creating tables with {} position buckets", nbr_buckets);
        self.conn.execute_batch("BEGIN")?;
        self.conn.execute_batch(&schema_sql(nbr_buckets))?;
        let described: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM description", [], |row| row.get(0))?;
        if described == 0 {
            self.conn.execute(
                "INSERT INTO description (text, version) VALUES (?1, ?2)",
                params![DESCRIPTION, FORMAT_VERSION],
            )?;
        }
        self.conn.execute_batch("COMMIT")?;
        self.nbr_buckets = nbr_buckets;
        Ok(())
    }

    pub fn description(&self) -> Result<(String, i64)> {
        Ok(self.conn.query_row(
            "SELECT text, version FROM description LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }

    pub fn count_games(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?)
    }

    pub fn count_duplicates(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM games_duplicates", [], |row| row.get(0))?)
    }

    /// Rows across every position table.
    pub fn count_positions(&self) -> Result<i64> {
        let mut total = 0;
        for bucket in 0..self.nbr_buckets {
            let rows: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", bucket_table(bucket)),
                [],
                |row| row.get(0),
            )?;
            total += rows;
        }
        Ok(total)
    }

    pub fn game(&self, game_id: i64) -> Result<Option<GameRecord>> {
        ops::game_by_id(&self.conn, game_id)
    }

    /// Canonical and colliding rows whose fingerprint is `game_hash`.
    pub fn games_with_hash(&self, game_hash: u64) -> Result<Vec<GameRecord>> {
        ops::games_with_hash(&self.conn, game_hash)
    }

    /// Every canonical game in insertion order.
    pub fn load_games(&self) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM games ORDER BY rowid",
            ops::GAME_COLUMNS
        ))?;
        let games = stmt
            .query_map([], GameRecord::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    /// The stored mainline of a game in standard algebraic notation.
    pub fn game_san_moves(&self, game_id: i64) -> Result<Option<Vec<String>>> {
        let Some(game) = self.game(game_id)? else {
            return Ok(None);
        };
        let mut chess = Chess::default();
        let sans = encoding::decode_moves(&game.moves)?
            .iter()
            .map(|mv| SanPlus::from_move_and_play_unchecked(&mut chess, mv).to_string())
            .collect();
        Ok(Some(sans))
    }

    pub fn create_indexes(&self) -> Result<()> {
        info!("Creating game index");
        self.conn
            .execute_batch("CREATE INDEX IF NOT EXISTS idx_games ON games(game_id);")?;
        Ok(())
    }

    pub fn create_extra_indexes(&self) -> Result<()> {
        info!("Creating player and position indexes");
        let mut sql = String::from(
            "BEGIN;
            CREATE INDEX IF NOT EXISTS idx_white ON games(white);
            CREATE INDEX IF NOT EXISTS idx_black ON games(black);\n",
        );
        for bucket in 0..self.nbr_buckets {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx{bucket} ON {}(position_hash, game_id);\n",
                bucket_table(bucket)
            ));
        }
        sql.push_str("COMMIT;");
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Sqlite(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_tables_writes_description_once() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.nbr_buckets(), 0);
        db.create_tables(8).unwrap();
        db.create_tables(8).unwrap();
        assert_eq!(db.nbr_buckets(), 8);
        assert_eq!(
            db.description().unwrap(),
            (DESCRIPTION.to_string(), FORMAT_VERSION)
        );
        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM description", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn reopen_detects_bucket_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.db");
        let mut db = Database::create(&path).unwrap();
        db.create_tables(32).unwrap();
        db.close().unwrap();

        assert!(matches!(Database::create(&path), Err(Error::DatabaseExists(_))));
        let db = Database::open(&path).unwrap();
        assert_eq!(db.nbr_buckets(), 32);
        assert_eq!(db.count_games().unwrap(), 0);
    }

    #[test]
    fn indexes_are_created_per_bucket() {
        let mut db = Database::open_in_memory().unwrap();
        db.create_tables(4).unwrap();
        db.create_indexes().unwrap();
        db.create_extra_indexes().unwrap();
        let indexes: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        // idx_games, idx_white, idx_black and idx0..idx3
        assert_eq!(indexes, 7);
    }
}
