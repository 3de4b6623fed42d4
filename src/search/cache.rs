use log::warn;
use serde::Serialize;
use shakmaty::Move;

use super::compact::{compact_moves, CompactMove};
use crate::{
    db::{encoding::decode_moves, Database},
    error::Result,
    pgn::{GameSink, ParsedGame},
};

/// How a cached game is replayed. Chosen once when the game is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayMode {
    /// Byte board, no promotions in the game.
    Quick,
    /// Full rules engine.
    Slow,
}

#[derive(Debug, Clone)]
pub struct CachedGame {
    pub game_id: i64,
    pub white: String,
    pub black: String,
    pub result: String,
    pub moves: Vec<CompactMove>,
    pub mode: ReplayMode,
}

impl CachedGame {
    pub fn new(game_id: i64, white: &str, black: &str, result: &str, moves: &[Move]) -> Self {
        let compact = compact_moves(moves);
        let mode = if compact.len() == moves.len() && !compact.iter().any(|mv| mv.is_promotion()) {
            ReplayMode::Quick
        } else {
            ReplayMode::Slow
        };
        Self {
            game_id,
            white: white.to_string(),
            black: black.to_string(),
            result: result.to_string(),
            moves: compact,
            mode,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GameCache {
    games: Vec<CachedGame>,
}

impl GameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches every canonical game of `db`. Games whose stored moves do not
    /// decode are left out.
    pub fn from_database(db: &Database) -> Result<Self> {
        let mut cache = Self::new();
        for game in db.load_games()? {
            match decode_moves(&game.moves) {
                Ok(moves) => cache.push(CachedGame::new(
                    game.game_id,
                    &game.white,
                    &game.black,
                    &game.result,
                    &moves,
                )),
                Err(e) => warn!("Not caching game {}: {}", game.game_id, e),
            }
        }
        Ok(cache)
    }

    pub fn push(&mut self, game: CachedGame) {
        self.games.push(game);
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CachedGame> {
        self.games.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedGame> {
        self.games.iter()
    }
}

/// Games read from notation files get their position in the cache as id.
impl GameSink for GameCache {
    fn game_complete(&mut self, game: &ParsedGame) -> Result<()> {
        let game_id = self.games.len() as i64;
        self.push(CachedGame::new(
            game_id,
            &game.headers.white,
            &game.headers.black,
            &game.headers.result,
            &game.moves,
        ));
        Ok(())
    }
}
