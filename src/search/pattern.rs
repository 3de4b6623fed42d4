use shakmaty::{fen::Fen, Board};

use super::quick::{board_bytes, piece_counts, EMPTY};
use crate::error::Result;

/// Decides whether a board (as square bytes) satisfies a pattern.
pub trait PatternMatch {
    fn matches(&self, squares: &[u8; 64]) -> bool;

    /// `false` once a game with these piece counts can never match again.
    /// Counts only ever go down, so a scan may stop there.
    fn can_still_match(&self, _counts: [u8; 2]) -> bool {
        true
    }
}

/// A partial position: every listed piece must stand on its square, other
/// squares are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiecePattern {
    pieces: Vec<(usize, u8)>,
    counts: [u8; 2],
}

impl PiecePattern {
    pub fn new(board: &Board) -> Self {
        let squares = board_bytes(board);
        let pieces = squares
            .iter()
            .enumerate()
            .filter(|(_, &code)| code != EMPTY)
            .map(|(sq, &code)| (sq, code))
            .collect();
        Self {
            pieces,
            counts: piece_counts(&squares),
        }
    }

    /// Only the board field of `fen` is used.
    pub fn from_fen(fen: &str) -> Result<Self> {
        let setup = Fen::from_ascii(fen.as_bytes())?.into_setup();
        Ok(Self::new(&setup.board))
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

impl PatternMatch for PiecePattern {
    fn matches(&self, squares: &[u8; 64]) -> bool {
        self.pieces.iter().all(|&(sq, code)| squares[sq] == code)
    }

    fn can_still_match(&self, counts: [u8; 2]) -> bool {
        counts[0] >= self.counts[0] && counts[1] >= self.counts[1]
    }
}
