//! Byte board replay for games without promotions.
//!
//! Each square holds one byte: `0` when empty, otherwise the role in the low
//! three bits (pawn `1` to king `6`) with bit 3 set for black. The eight
//! squares of a rank share one `u64`, so comparing whole boards costs eight
//! word comparisons. No legality is checked: the moves were legal when they
//! were parsed.

use shakmaty::{Board, Color, Piece, Role, Square};

use super::{
    compact::{CompactMove, MoveKind},
    Replay, SearchTarget,
};

pub const EMPTY: u8 = 0;
const PAWN: u8 = 1;
const ROOK: u8 = 4;
const KING: u8 = 6;
const BLACK: u8 = 8;

const WHITE_HOME_RANK: u64 = 0xff;
const BLACK_HOME_RANK: u64 = 0xff << 56;

pub fn piece_code(piece: Piece) -> u8 {
    let role = match piece.role {
        Role::Pawn => PAWN,
        Role::Knight => 2,
        Role::Bishop => 3,
        Role::Rook => ROOK,
        Role::Queen => 5,
        Role::King => KING,
    };
    match piece.color {
        Color::White => role,
        Color::Black => role | BLACK,
    }
}

#[inline]
fn color_index(code: u8) -> usize {
    usize::from(code & BLACK != 0)
}

/// Square bytes of a rules engine board.
pub fn board_bytes(board: &Board) -> [u8; 64] {
    let mut squares = [EMPTY; 64];
    for sq in Square::ALL {
        if let Some(piece) = board.piece_at(sq) {
            squares[usize::from(sq)] = piece_code(piece);
        }
    }
    squares
}

pub fn rank_words(squares: &[u8; 64]) -> [u64; 8] {
    let mut words = [0; 8];
    for (word, rank) in words.iter_mut().zip(squares.chunks_exact(8)) {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(rank);
        *word = u64::from_le_bytes(bytes);
    }
    words
}

/// Pieces per color, white first.
pub fn piece_counts(squares: &[u8; 64]) -> [u8; 2] {
    squares
        .iter()
        .filter(|&&code| code != EMPTY)
        .fold([0, 0], |mut counts, &code| {
            counts[color_index(code)] += 1;
            counts
        })
}

/// Bit `f` is set for a white pawn on file `f` of the second rank, bit
/// `8 + f` for a black pawn on file `f` of the seventh rank.
pub fn home_pawns(squares: &[u8; 64]) -> u16 {
    (0..8).fold(0, |mask, file| {
        let white = u16::from(squares[8 + file] == PAWN) << file;
        let black = u16::from(squares[48 + file] == PAWN | BLACK) << (8 + file);
        mask | white | black
    })
}

#[derive(Debug, Clone)]
pub struct QuickBoard {
    ranks: [u64; 8],
    white_to_move: bool,
    /// Rook squares that still carry a castling right.
    castling: u64,
    ep_square: Option<u8>,
    counts: [u8; 2],
}

impl Default for QuickBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl QuickBoard {
    /// The standard starting position.
    pub fn new() -> Self {
        let squares = board_bytes(&Board::default());
        Self {
            ranks: rank_words(&squares),
            white_to_move: true,
            castling: 1 << 0 | 1 << 7 | 1 << 56 | 1 << 63,
            ep_square: None,
            counts: piece_counts(&squares),
        }
    }

    #[inline]
    fn get(&self, sq: usize) -> u8 {
        (self.ranks[sq >> 3] >> ((sq & 7) * 8)) as u8
    }

    #[inline]
    fn set(&mut self, sq: usize, code: u8) {
        let shift = (sq & 7) * 8;
        let word = &mut self.ranks[sq >> 3];
        *word = (*word & !(0xff << shift)) | u64::from(code) << shift;
    }

    fn capture(&mut self, sq: usize) {
        let victim = self.get(sq);
        if victim != EMPTY {
            self.counts[color_index(victim)] -= 1;
            self.set(sq, EMPTY);
        }
    }

    /// A pawn of the other color stands next to `sq` on the same rank.
    fn enemy_pawn_beside(&self, sq: usize, mover: u8) -> bool {
        let enemy_pawn = (mover ^ BLACK) & (PAWN | BLACK);
        let file = sq & 7;
        (file > 0 && self.get(sq - 1) == enemy_pawn) || (file < 7 && self.get(sq + 1) == enemy_pawn)
    }

    pub fn ep_square(&self) -> Option<u8> {
        self.ep_square
    }
}

impl Replay for QuickBoard {
    fn advance(&mut self, mv: CompactMove) -> bool {
        let (from, to) = (mv.from_index(), mv.to_index());
        let piece = self.get(from);
        if piece == EMPTY {
            return false;
        }
        self.ep_square = None;

        match mv.kind() {
            MoveKind::Normal => {
                self.capture(to);
                self.set(from, EMPTY);
                self.set(to, piece);
                if piece & 7 == PAWN && from.abs_diff(to) == 16 && self.enemy_pawn_beside(to, piece) {
                    self.ep_square = Some(((from + to) / 2) as u8);
                }
            }
            MoveKind::EnPassant => {
                self.capture((from & !7) | (to & 7));
                self.set(from, EMPTY);
                self.set(to, piece);
            }
            MoveKind::Castle => {
                let rank = from & !7;
                let (king_to, rook_to) = if to > from {
                    (rank | 6, rank | 5)
                } else {
                    (rank | 2, rank | 3)
                };
                let rook = self.get(to);
                self.set(from, EMPTY);
                self.set(to, EMPTY);
                self.set(king_to, piece);
                self.set(rook_to, rook);
            }
            MoveKind::Promotion(_) => return false,
        }

        if piece == KING {
            self.castling &= !WHITE_HOME_RANK;
        } else if piece == KING | BLACK {
            self.castling &= !BLACK_HOME_RANK;
        }
        self.castling &= !(1 << from | 1 << to);
        self.white_to_move = !self.white_to_move;
        true
    }

    fn matches(&self, target: &SearchTarget) -> bool {
        self.ranks == target.words
            && self.white_to_move == target.white_to_move
            && self.castling == target.castling
            && self.ep_square == target.ep_square
    }

    fn squares(&self) -> [u8; 64] {
        let mut squares = [EMPTY; 64];
        for (rank, word) in squares.chunks_exact_mut(8).zip(self.ranks) {
            rank.copy_from_slice(&word.to_le_bytes());
        }
        squares
    }

    fn counts(&self) -> [u8; 2] {
        self.counts
    }

    fn home_pawns(&self) -> u16 {
        home_pawns(&self.squares())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{san::San, Chess, EnPassantMode, Position};

    fn replay(sans: &[&str]) -> (QuickBoard, Chess) {
        let mut chess = Chess::default();
        let mut quick = QuickBoard::new();
        for san in sans {
            let mv = san.parse::<San>().unwrap().to_move(&chess).unwrap();
            assert!(quick.advance(CompactMove::from_move(&mv).unwrap()));
            chess.play_unchecked(&mv);
        }
        (quick, chess)
    }

    #[test]
    fn start_position_bookkeeping() {
        let quick = QuickBoard::new();
        assert_eq!(quick.counts(), [16, 16]);
        assert_eq!(quick.home_pawns(), 0xffff);
        assert_eq!(quick.squares(), board_bytes(&Board::default()));
    }

    #[test]
    fn follows_the_rules_engine() {
        let (quick, chess) = replay(&[
            "e4", "d5", "exd5", "c6", "dxc6", "Nxc6", "Nf3", "e5", "Bb5", "f6", "O-O", "Qd6", "Nc3", "e4",
            "d4", "exd3", "Qxd3", "Be6", "Re1", "O-O-O",
        ]);
        assert_eq!(quick.squares(), board_bytes(chess.board()));
        assert_eq!(quick.counts(), piece_counts(&board_bytes(chess.board())));
        assert_eq!(quick.home_pawns(), home_pawns(&board_bytes(chess.board())));
        assert_eq!(quick.castling, chess.castles().castling_rights().0);
    }

    #[test]
    fn ep_square_only_when_capturable() {
        let (quick, chess) = replay(&["e4", "Nf6", "e5", "d5"]);
        assert_eq!(quick.ep_square(), Some(43));
        assert_eq!(
            chess.ep_square(EnPassantMode::PseudoLegal).map(usize::from),
            Some(43)
        );
        let (quick, _) = replay(&["e4"]);
        assert_eq!(quick.ep_square(), None);
    }

    #[test]
    fn promotions_are_refused() {
        let mut quick = QuickBoard::new();
        let mv = CompactMove::new(Square::A2, Square::A3, MoveKind::Promotion(Role::Queen));
        assert!(!quick.advance(mv));
    }
}
