//! Position and game hashing on top of shakmaty's Zobrist keys.
//!
//! The running position hash starts at [`INITIAL_HASH`] and is updated with
//! the Zobrist delta of every move played. Because Zobrist keys are XOR
//! composable, the hash after any move sequence equals
//! `INITIAL_HASH ^ Z(start) ^ Z(current)`, which [`position_key`] computes
//! directly for positions that were never reached by replay.

use shakmaty::{
    zobrist::{Zobrist64, ZobristHash},
    Chess, EnPassantMode, Move, Position,
};

/// Value of the running hash before the first move of every game.
pub const INITIAL_HASH: u64 = 0x0f6e_2dc7_837a_a12f;

#[inline]
fn zobrist(position: &Chess) -> u64 {
    position.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

/// Plays `mv` on `position` and returns the updated running hash.
///
/// The move must be legal in `position`.
pub fn play_and_update(hash: u64, position: &mut Chess, mv: &Move) -> u64 {
    let before = zobrist(position);
    position.play_unchecked(mv);
    hash ^ before ^ zobrist(position)
}

/// Running hash a game starting from the standard position would carry on
/// reaching `position`.
pub fn position_key(position: &Chess) -> u64 {
    INITIAL_HASH ^ zobrist(&Chess::default()) ^ zobrist(position)
}

/// Replays `moves` from the standard start and returns the running hash after
/// each one.
pub fn hash_trail(moves: &[Move]) -> Vec<u64> {
    let mut position = Chess::default();
    let mut hash = INITIAL_HASH;
    moves
        .iter()
        .map(|mv| {
            hash = play_and_update(hash, &mut position, mv);
            hash
        })
        .collect()
}

/// Order sensitive fingerprint of a whole game, used as a deduplication key.
/// Equal fingerprints do not imply equal games.
pub fn fold_game_hash(position_hashes: &[u64]) -> u64 {
    position_hashes
        .iter()
        .enumerate()
        .fold(INITIAL_HASH, |game_hash, (counter, hash)| {
            game_hash ^ hash ^ counter as u64
        })
}
