//! Position search over games held in memory.
//!
//! Every cached game is replayed from the standard start and compared with
//! the target after each ply. Games without promotions are replayed on a
//! byte board ([`quick::QuickBoard`]); the rest go through the rules engine
//! ([`slow::SlowBoard`]). Both are driven through [`Replay`], and the choice
//! is made once per game when it is cached.

pub mod cache;
pub mod compact;
pub mod pattern;
pub mod quick;
pub mod slow;

use log::{info, warn};
use serde::Serialize;
use shakmaty::{fen::Fen, Board, CastlingMode, Chess, Color, EnPassantMode, Position};
use std::time::Instant;

pub use cache::{CachedGame, GameCache, ReplayMode};
pub use compact::{CompactMove, MoveKind};
pub use pattern::{PatternMatch, PiecePattern};

use crate::{
    error::{Error, Result},
    progress::Progress,
};
use quick::{board_bytes, home_pawns, piece_counts, rank_words, QuickBoard};
use slow::SlowBoard;

/// One way of replaying a game ply by ply.
pub trait Replay {
    /// Plays one move. `false` if the move cannot be applied.
    fn advance(&mut self, mv: CompactMove) -> bool;

    fn matches(&self, target: &SearchTarget) -> bool;

    fn squares(&self) -> [u8; 64];

    /// Pieces per color, white first.
    fn counts(&self) -> [u8; 2];

    /// Pawns still on their starting squares, see [`quick::home_pawns`].
    fn home_pawns(&self) -> u16;

    /// `false` once the target can no longer be reached: pieces are never
    /// added and a pawn never returns to its starting square.
    fn can_reach(&self, target: &SearchTarget) -> bool {
        let counts = self.counts();
        counts[0] >= target.counts[0]
            && counts[1] >= target.counts[1]
            && target.home_pawns & !self.home_pawns() == 0
    }
}

/// The position searched for: board, side to move, castling rights and a
/// pseudo-legal en passant square.
#[derive(Debug, Clone)]
pub struct SearchTarget {
    board: Board,
    white_to_move: bool,
    castling: u64,
    ep_square: Option<u8>,
    words: [u64; 8],
    counts: [u8; 2],
    home_pawns: u16,
}

impl SearchTarget {
    pub fn new(position: &Chess) -> Self {
        let squares = board_bytes(position.board());
        Self {
            board: position.board().clone(),
            white_to_move: position.turn() == Color::White,
            castling: position.castles().castling_rights().0,
            ep_square: position.ep_square(EnPassantMode::PseudoLegal).map(u8::from),
            words: rank_words(&squares),
            counts: piece_counts(&squares),
            home_pawns: home_pawns(&squares),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let position: Chess = Fen::from_ascii(fen.as_bytes())?.into_position(CastlingMode::Standard)?;
        Ok(Self::new(&position))
    }
}

/// A game passing through the target. Ply 0 is the starting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Position of the game in the cache.
    pub index: usize,
    pub game_id: i64,
    pub first_ply: usize,
    pub last_ply: usize,
}

enum Probe {
    Hit,
    Miss,
    Unreachable,
}

/// Replays `moves` and returns the first and last ply where `probe` hit.
fn scan_game<R: Replay>(
    mut board: R,
    moves: &[CompactMove],
    probe: &dyn Fn(&dyn Replay) -> Probe,
) -> Option<(usize, usize)> {
    let mut found: Option<(usize, usize)> = None;
    for ply in 0..=moves.len() {
        if ply > 0 && !board.advance(moves[ply - 1]) {
            warn!("Cannot replay ply {}, skipping rest of game", ply);
            break;
        }
        let view: &dyn Replay = &board;
        match probe(view) {
            Probe::Hit => {
                found = Some(found.map_or((ply, ply), |(first, _)| (first, ply)));
            }
            Probe::Miss => {}
            Probe::Unreachable => break,
        }
    }
    found
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryPositionSearch {
    /// Replay every game through the rules engine.
    pub force_slow: bool,
}

impl MemoryPositionSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Games of `cache` passing through `target`, in cache order.
    pub fn search(
        &self,
        target: &SearchTarget,
        cache: &GameCache,
        progress: &mut dyn Progress,
    ) -> Result<Vec<SearchHit>> {
        self.scan(cache, progress, "Searching position", &|board: &dyn Replay| {
            if board.matches(target) {
                Probe::Hit
            } else if !board.can_reach(target) {
                Probe::Unreachable
            } else {
                Probe::Miss
            }
        })
    }

    /// Games of `cache` where `pattern` matches at some ply.
    pub fn search_pattern(
        &self,
        pattern: &dyn PatternMatch,
        cache: &GameCache,
        progress: &mut dyn Progress,
    ) -> Result<Vec<SearchHit>> {
        self.scan(cache, progress, "Searching pattern", &|board: &dyn Replay| {
            if pattern.matches(&board.squares()) {
                Probe::Hit
            } else if !pattern.can_still_match(board.counts()) {
                Probe::Unreachable
            } else {
                Probe::Miss
            }
        })
    }

    fn scan(
        &self,
        cache: &GameCache,
        progress: &mut dyn Progress,
        title: &str,
        probe: &dyn Fn(&dyn Replay) -> Probe,
    ) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        progress.begin(title, &format!("{} games", cache.len()), Some(cache.len() as u64));

        let mut hits = Vec::new();
        for (index, game) in cache.iter().enumerate() {
            let mode = if self.force_slow {
                ReplayMode::Slow
            } else {
                game.mode
            };
            let found = match mode {
                ReplayMode::Quick => scan_game(QuickBoard::new(), &game.moves, probe),
                ReplayMode::Slow => scan_game(SlowBoard::new(), &game.moves, probe),
            };
            if let Some((first_ply, last_ply)) = found {
                hits.push(SearchHit {
                    index,
                    game_id: game.game_id,
                    first_ply,
                    last_ply,
                });
            }
            if progress.report(index as u64 + 1) {
                return Err(Error::SearchStopped);
            }
        }

        info!(
            "{}: {} of {} games matched in {:?}",
            title,
            hits.len(),
            cache.len(),
            start.elapsed()
        );
        Ok(hits)
    }
}
