//! Game ingestion into a [`Database`].
//!
//! An [`IngestSession`] owns everything that lives across games during an
//! import: the next game id, the pending bucket lists and the counters.
//! Writes happen between [`IngestSession::begin`] and
//! [`IngestSession::end`]; `end` and `close` flush every bucket.

use log::{debug, info};
use serde::Serialize;
use shakmaty::Move;

use super::{
    buckets::Buckets,
    encoding::encode_moves,
    ops::{self, GameRecord, Recorded},
    Database,
};
use crate::{
    config::IndexConfig,
    error::{Error, Result},
    hashing::fold_game_hash,
    pgn::{GameHeaders, GameSink, ParsedGame},
};

const MAX_FIELD_LEN: usize = 196;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub games_offered: u64,
    pub games_accepted: u64,
    pub duplicates_folded: u64,
    pub hash_collisions: u64,
    pub discarded_short: u64,
    pub discarded_weak: u64,
    pub discarded_unnamed: u64,
    pub positions_flushed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    TooShort,
    BothPlayersWeak,
    MissingName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Discarded(DiscardReason),
    Duplicate,
    Inserted { game_id: i64 },
    /// Stored under a fingerprint another game already had.
    Collision { game_id: i64 },
}

/// Replaces anything but ASCII alphanumerics, space, `.` and `,` with `_`
/// and caps the length.
pub fn sanitise(value: &str) -> String {
    value
        .chars()
        .take(MAX_FIELD_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | ',') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Leading decimal digits of a rating tag, if any.
pub fn parse_elo(value: &str) -> Option<u32> {
    let digits = value
        .trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    btoi::btoi(&value.trim_start().as_bytes()[..digits]).ok()
}

fn has_name(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_alphabetic())
}

pub struct IngestSession<'db> {
    db: &'db Database,
    config: IndexConfig,
    next_game_id: i64,
    buckets: Buckets,
    in_transaction: bool,
    stats: IngestStats,
}

impl<'db> IngestSession<'db> {
    /// The id counter restarts from the number of stored games.
    ///
    /// `config.nbr_buckets` must equal the bucket count `db` was created
    /// with, otherwise positions would land in tables lookups never read.
    pub fn new(db: &'db Database, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        if db.nbr_buckets() != config.nbr_buckets {
            return Err(Error::InvalidConfig(format!(
                "database has {} bucket tables, session configured for {}",
                db.nbr_buckets(),
                config.nbr_buckets
            )));
        }
        let next_game_id = db.count_games()?;
        Ok(Self {
            db,
            config: config.clone(),
            next_game_id,
            buckets: Buckets::new(config),
            in_transaction: false,
            stats: IngestStats::default(),
        })
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn next_game_id(&self) -> i64 {
        self.next_game_id
    }

    pub fn pending_positions(&self) -> usize {
        self.buckets.pending()
    }

    pub fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.db.conn().execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    /// Flushes every bucket and commits.
    pub fn end(&mut self) -> Result<()> {
        self.flush_all()?;
        if self.in_transaction {
            self.db.conn().execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    /// Drops pending positions and rolls back the open transaction.
    pub fn abandon(mut self) -> Result<()> {
        if self.in_transaction {
            self.db.conn().execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        info!("Import abandoned after {} games", self.stats.games_offered);
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        let written = self.buckets.flush_all(self.db.conn())?;
        self.stats.positions_flushed += written as u64;
        Ok(())
    }

    /// Commits any open transaction, writes whatever is still pending and
    /// returns the final counters.
    pub fn close(mut self) -> Result<IngestStats> {
        if self.in_transaction || self.buckets.pending() > 0 {
            self.begin()?;
            self.end()?;
        }
        info!(
            "Ingested {} of {} games ({} duplicates, {} collisions, {} positions)",
            self.stats.games_accepted,
            self.stats.games_offered,
            self.stats.duplicates_folded,
            self.stats.hash_collisions,
            self.stats.positions_flushed
        );
        Ok(self.stats)
    }

    fn policy(&self, headers: &GameHeaders, moves: &[Move]) -> Option<DiscardReason> {
        if moves.len() < self.config.min_plies {
            return Some(DiscardReason::TooShort);
        }
        let weak = |elo: &str| {
            parse_elo(elo).is_some_and(|elo| elo > 0 && elo < self.config.strength_floor)
        };
        if weak(&headers.white_elo) && weak(&headers.black_elo) {
            return Some(DiscardReason::BothPlayersWeak);
        }
        if !has_name(&sanitise(&headers.white)) || !has_name(&sanitise(&headers.black)) {
            return Some(DiscardReason::MissingName);
        }
        None
    }

    /// Applies the storage policy to a parsed game and stores it.
    /// `hashes` holds the running position hash after every move.
    pub fn insert_game(&mut self, headers: &GameHeaders, moves: &[Move], hashes: &[u64]) -> Result<InsertOutcome> {
        self.insert_with_hash(headers, moves, hashes, fold_game_hash(hashes))
    }

    /// Like [`IngestSession::insert_game`] with a caller supplied game
    /// fingerprint.
    pub fn insert_with_hash(
        &mut self,
        headers: &GameHeaders,
        moves: &[Move],
        hashes: &[u64],
        game_hash: u64,
    ) -> Result<InsertOutcome> {
        self.stats.games_offered += 1;
        if let Some(reason) = self.policy(headers, moves) {
            match reason {
                DiscardReason::TooShort => self.stats.discarded_short += 1,
                DiscardReason::BothPlayersWeak => self.stats.discarded_weak += 1,
                DiscardReason::MissingName => self.stats.discarded_unnamed += 1,
            }
            return Ok(InsertOutcome::Discarded(reason));
        }

        let game_id = self.next_game_id;
        let record = GameRecord {
            game_id,
            game_hash: Some(game_hash),
            white: sanitise(&headers.white),
            black: sanitise(&headers.black),
            event: sanitise(&headers.event),
            site: sanitise(&headers.site),
            result: headers.result.clone(),
            date: headers.date.clone(),
            white_elo: parse_elo(&headers.white_elo),
            black_elo: parse_elo(&headers.black_elo),
            moves: encode_moves(moves)?,
        };

        let outcome = match ops::record_game(self.db.conn(), &record)? {
            Recorded::Duplicate => {
                self.stats.duplicates_folded += 1;
                return Ok(InsertOutcome::Duplicate);
            }
            Recorded::Inserted => InsertOutcome::Inserted { game_id },
            Recorded::Collision => {
                self.stats.hash_collisions += 1;
                InsertOutcome::Collision { game_id }
            }
        };

        for &hash in hashes {
            let written = self.buckets.push(self.db.conn(), hash, game_id)?;
            self.stats.positions_flushed += written as u64;
        }
        self.next_game_id += 1;
        self.stats.games_accepted += 1;
        Ok(outcome)
    }
}

impl GameSink for IngestSession<'_> {
    fn game_complete(&mut self, game: &ParsedGame) -> Result<()> {
        if let InsertOutcome::Discarded(reason) =
            self.insert_game(&game.headers, &game.moves, &game.hashes)?
        {
            debug!(
                "Not storing {} - {}: {:?}",
                game.headers.white, game.headers.black, reason
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ReaderConfig, pgn::read_games};

    fn parse(text: &str) -> ParsedGame {
        let (mut games, _) = read_games(text.as_bytes(), &ReaderConfig::default()).unwrap();
        games.remove(0)
    }

    fn database(nbr_buckets: usize) -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.create_tables(nbr_buckets).unwrap();
        db
    }

    fn small_config() -> IndexConfig {
        IndexConfig {
            nbr_buckets: 16,
            purge_quota: 5,
            ..IndexConfig::default()
        }
    }

    const GAME: &str = "[White \"Kasparov, Garry\"]\n[Black \"Topalov, Veselin\"]\n[Result \"1-0\"]\n\n1. e4 d6 2. d4 Nf6 3. Nc3 g6 1-0\n";

    #[test]
    fn sanitise_keeps_safe_characters() {
        assert_eq!(sanitise("Smith, J. (ENG)"), "Smith, J. _ENG_");
        assert_eq!(sanitise("Müller"), "M_ller");
        assert_eq!(sanitise(&"x".repeat(300)).len(), 196);
    }

    #[test]
    fn elo_uses_leading_digits() {
        assert_eq!(parse_elo("2750"), Some(2750));
        assert_eq!(parse_elo(" 1850?"), Some(1850));
        assert_eq!(parse_elo("?"), None);
        assert_eq!(parse_elo(""), None);
    }

    #[test]
    fn accepted_game_queues_every_position() {
        let db = database(16);
        let mut session = IngestSession::new(&db, &small_config()).unwrap();
        let game = parse(GAME);
        session.begin().unwrap();
        let outcome = session.game_complete(&game);
        assert!(outcome.is_ok());
        session.end().unwrap();
        let stats = session.close().unwrap();
        assert_eq!(stats.games_accepted, 1);
        assert_eq!(stats.positions_flushed, 6);
        assert_eq!(db.count_positions().unwrap(), 6);
        assert_eq!(db.count_games().unwrap(), 1);
    }

    #[test]
    fn policy_discards_before_writing() {
        let db = database(16);
        let mut session = IngestSession::new(&db, &small_config()).unwrap();
        let mut game = parse(GAME);

        let short = &game.moves[..2];
        assert_eq!(
            session.insert_game(&game.headers, short, &game.hashes[..2]).unwrap(),
            InsertOutcome::Discarded(DiscardReason::TooShort)
        );

        game.headers.white_elo = "1800".to_string();
        game.headers.black_elo = "1999".to_string();
        assert_eq!(
            session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap(),
            InsertOutcome::Discarded(DiscardReason::BothPlayersWeak)
        );

        // one strong player is enough
        game.headers.black_elo = "2000".to_string();
        game.headers.white = "???".to_string();
        assert_eq!(
            session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap(),
            InsertOutcome::Discarded(DiscardReason::MissingName)
        );

        let stats = session.close().unwrap();
        assert_eq!(stats.games_offered, 3);
        assert_eq!(stats.games_accepted, 0);
        assert_eq!(db.count_games().unwrap(), 0);
        assert_eq!(db.count_positions().unwrap(), 0);
    }

    #[test]
    fn duplicate_does_not_consume_an_id() {
        let db = database(16);
        let mut session = IngestSession::new(&db, &small_config()).unwrap();
        let game = parse(GAME);
        session.begin().unwrap();
        assert_eq!(
            session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap(),
            InsertOutcome::Inserted { game_id: 0 }
        );
        assert_eq!(
            session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(session.next_game_id(), 1);
        assert_eq!(session.pending_positions() as u64 + session.stats().positions_flushed, 6);
        session.end().unwrap();
        assert_eq!(db.count_positions().unwrap(), 6);
    }

    #[test]
    fn bucket_count_must_match_the_database() {
        let db = database(64);
        let result = IngestSession::new(&db, &small_config());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let empty = Database::open_in_memory().unwrap();
        let result = IngestSession::new(&empty, &small_config());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn every_stored_position_is_found_by_lookup() {
        let db = database(16);
        let game = parse(GAME);
        let mut session = IngestSession::new(&db, &small_config()).unwrap();
        session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap();
        session.close().unwrap();
        for &hash in &game.hashes {
            assert_eq!(db.games_with_position(hash).unwrap(), vec![0]);
        }
    }

    #[test]
    fn id_counter_resumes_from_stored_games() {
        let db = database(16);
        let game = parse(GAME);
        let mut session = IngestSession::new(&db, &small_config()).unwrap();
        session.insert_game(&game.headers, &game.moves, &game.hashes).unwrap();
        session.close().unwrap();

        let session = IngestSession::new(&db, &small_config()).unwrap();
        assert_eq!(session.next_game_id(), 1);
    }
}
