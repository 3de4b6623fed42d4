use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::error::Result;

/// Column list shared by `games` and `games_duplicates`.
pub(crate) const GAME_COLUMNS: &str =
    "game_id, game_hash, white, black, event, site, result, date, white_elo, black_elo, moves";

/// A game as stored, after sanitation and move encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GameRecord {
    pub game_id: i64,
    pub game_hash: Option<u64>,
    pub white: String,
    pub black: String,
    pub event: String,
    pub site: String,
    pub result: String,
    pub date: String,
    pub white_elo: Option<u32>,
    pub black_elo: Option<u32>,
    pub moves: Vec<u8>,
}

impl GameRecord {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            game_id: row.get(0)?,
            game_hash: row.get::<_, Option<i64>>(1)?.map(|hash| hash as u64),
            white: row.get(2)?,
            black: row.get(3)?,
            event: row.get(4)?,
            site: row.get(5)?,
            result: row.get(6)?,
            date: row.get(7)?,
            white_elo: row.get(8)?,
            black_elo: row.get(9)?,
            moves: row.get(10)?,
        })
    }

    /// Same players, result and moves. Metadata such as the event is
    /// ignored.
    pub fn same_game(&self, other: &GameRecord) -> bool {
        self.white == other.white
            && self.black == other.black
            && self.result == other.result
            && self.moves == other.moves
    }
}

/// What happened to a game handed to [`record_game`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// New game, canonical row written with its hash.
    Inserted,
    /// Another game already holds the hash. Written with a null hash and
    /// mirrored into `games_duplicates`.
    Collision,
    /// An identical game is already stored. Nothing was written.
    Duplicate,
}

fn insert_into(conn: &Connection, table: &str, game_hash: Option<u64>, game: &GameRecord) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT INTO {table} ({GAME_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ))?;
    stmt.execute(params![
        game.game_id,
        game_hash.map(|hash| hash as i64),
        game.white,
        game.black,
        game.event,
        game.site,
        game.result,
        game.date,
        game.white_elo,
        game.black_elo,
        game.moves,
    ])
}

/// All stored games, canonical or not, whose fingerprint is `game_hash`.
pub fn games_with_hash(conn: &Connection, game_hash: u64) -> Result<Vec<GameRecord>> {
    let mut games = Vec::new();
    for table in ["games", "games_duplicates"] {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {GAME_COLUMNS} FROM {table} WHERE game_hash = ?1"
        ))?;
        let rows = stmt.query_map(params![game_hash as i64], GameRecord::from_row)?;
        for row in rows {
            games.push(row?);
        }
    }
    Ok(games)
}

/// Writes `game` keyed by its fingerprint.
/// If the fingerprint is taken, the stored games are compared in full
/// before deciding whether this is the same game or a collision.
pub fn record_game(conn: &Connection, game: &GameRecord) -> Result<Recorded> {
    let game_hash = game.game_hash.unwrap_or_default();

    // Try insert first (most common case for new games)
    match insert_into(conn, "games", Some(game_hash), game) {
        Ok(_) => Ok(Recorded::Inserted),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            if games_with_hash(conn, game_hash)?
                .iter()
                .any(|stored| stored.same_game(game))
            {
                debug!("Skipping duplicate {} - {} ({})", game.white, game.black, game.date);
                return Ok(Recorded::Duplicate);
            }
            debug!("Game hash {:016x} collides, storing {} - {} separately", game_hash, game.white, game.black);
            insert_into(conn, "games", None, game)?;
            insert_into(conn, "games_duplicates", Some(game_hash), game)?;
            Ok(Recorded::Collision)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn game_by_id(conn: &Connection, game_id: i64) -> Result<Option<GameRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE game_id = ?1"
    ))?;
    Ok(stmt
        .query_row(params![game_id], GameRecord::from_row)
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&crate::db::schema_sql(1)).unwrap();
        conn
    }

    fn game(game_id: i64, white: &str, moves: &[u8]) -> GameRecord {
        GameRecord {
            game_id,
            game_hash: Some(42),
            white: white.to_string(),
            black: "Black".to_string(),
            result: "1-0".to_string(),
            moves: moves.to_vec(),
            ..GameRecord::default()
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn identical_game_is_not_written_twice() {
        let conn = setup();
        assert_eq!(record_game(&conn, &game(0, "White", &[1, 2, 3])).unwrap(), Recorded::Inserted);
        let mut again = game(1, "White", &[1, 2, 3]);
        again.event = "Different event".to_string();
        assert_eq!(record_game(&conn, &again).unwrap(), Recorded::Duplicate);
        assert_eq!(count(&conn, "games"), 1);
        assert_eq!(count(&conn, "games_duplicates"), 0);
    }

    #[test]
    fn collision_is_kept_in_both_tables() {
        let conn = setup();
        record_game(&conn, &game(0, "White", &[1, 2, 3])).unwrap();
        assert_eq!(record_game(&conn, &game(1, "Other", &[1, 2, 3])).unwrap(), Recorded::Collision);
        assert_eq!(count(&conn, "games"), 2);
        assert_eq!(count(&conn, "games_duplicates"), 1);
        assert_eq!(game_by_id(&conn, 1).unwrap().unwrap().game_hash, None);

        // a replay of the colliding game is found in the side table
        assert_eq!(record_game(&conn, &game(2, "Other", &[1, 2, 3])).unwrap(), Recorded::Duplicate);
        assert_eq!(count(&conn, "games"), 2);
        assert_eq!(games_with_hash(&conn, 42).unwrap().len(), 2);
    }
}
