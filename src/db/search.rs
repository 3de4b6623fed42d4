//! Position lookups through the bucket tables.
//!
//! A position is found by its running hash alone, so the lookup works for
//! any move order that reaches it. The starting position itself is never
//! indexed.

use log::info;
use rusqlite::params;
use shakmaty::{fen::Fen, CastlingMode, Chess};

use super::{bucket_table, split_hash, Database, GameRecord};
use crate::{error::Result, hashing::position_key};

impl Database {
    /// Ids of the games that passed through the position with running hash
    /// `hash`, in ascending order.
    pub fn games_with_position(&self, hash: u64) -> Result<Vec<i64>> {
        if self.nbr_buckets() == 0 {
            return Ok(Vec::new());
        }
        let (bucket, key) = split_hash(hash, self.nbr_buckets());
        let mut stmt = self.conn().prepare_cached(&format!(
            "SELECT DISTINCT game_id FROM {} WHERE position_hash = ?1 ORDER BY game_id",
            bucket_table(bucket)
        ))?;
        let ids = stmt
            .query_map(params![i64::from(key)], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn count_games_with_position(&self, hash: u64) -> Result<usize> {
        if self.nbr_buckets() == 0 {
            return Ok(0);
        }
        let (bucket, key) = split_hash(hash, self.nbr_buckets());
        let count: i64 = self.conn().query_row(
            &format!(
                "SELECT COUNT(DISTINCT game_id) FROM {} WHERE position_hash = ?1",
                bucket_table(bucket)
            ),
            params![i64::from(key)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Games reaching the position described by `fen`.
    pub fn search_position_fen(&self, fen: &str) -> Result<Vec<GameRecord>> {
        let position: Chess = Fen::from_ascii(fen.as_bytes())?.into_position(CastlingMode::Standard)?;
        let ids = self.games_with_position(position_key(&position))?;
        info!("Found {} games for {}", ids.len(), fen);

        let mut games = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(game) = self.game(id)? {
                games.push(game);
            }
        }
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{IndexConfig, ReaderConfig},
        db::{Database, IngestSession},
        pgn::read_games,
    };

    const GAMES: &str = r#"[White "Carlsen, Magnus"]
[Black "Nakamura, Hikaru"]
[Result "1-0"]

1. Nf3 Nf6 2. d4 e6 3. c4 1-0

[White "Caruana, Fabiano"]
[Black "Giri, Anish"]
[Result "1/2-1/2"]

1. d4 Nf6 2. Nf3 e6 3. g3 1/2-1/2

[White "Ding, Liren"]
[Black "Nepomniachtchi, Ian"]
[Result "0-1"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 0-1
"#;

    fn indexed() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.create_tables(64).unwrap();
        let config = IndexConfig {
            nbr_buckets: 64,
            ..IndexConfig::default()
        };
        let (games, _) = read_games(GAMES.as_bytes(), &ReaderConfig::default()).unwrap();
        let mut session = IngestSession::new(&db, &config).unwrap();
        session.begin().unwrap();
        for game in &games {
            session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap();
        }
        session.end().unwrap();
        session.close().unwrap();
        db.create_indexes().unwrap();
        db.create_extra_indexes().unwrap();
        db
    }

    #[test]
    fn transposition_finds_both_games() {
        let db = indexed();
        // 1. Nf3 Nf6 2. d4 e6 and 1. d4 Nf6 2. Nf3 e6
        let games = db
            .search_position_fen("rnbqkb1r/pppp1ppp/4pn2/8/3P4/5N2/PPP1PPPP/RNBQKB1R w KQkq - 0 3")
            .unwrap();
        let whites: Vec<&str> = games.iter().map(|g| g.white.as_str()).collect();
        assert_eq!(whites, vec!["Carlsen, Magnus", "Caruana, Fabiano"]);
    }

    #[test]
    fn side_to_move_matters() {
        let db = indexed();
        let games = db
            .search_position_fen("rnbqkb1r/pppp1ppp/4pn2/8/3P4/5N2/PPP1PPPP/RNBQKB1R b KQkq - 0 3")
            .unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn stored_moves_render_as_san() {
        let db = indexed();
        assert_eq!(
            db.game_san_moves(2).unwrap().unwrap(),
            vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]
        );
        assert_eq!(db.game_san_moves(7).unwrap(), None);
        let last = crate::hashing::hash_trail(
            &crate::db::encoding::decode_moves(&db.game(2).unwrap().unwrap().moves).unwrap(),
        );
        assert_eq!(db.count_games_with_position(*last.last().unwrap()).unwrap(), 1);
    }
}
