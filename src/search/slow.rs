//! Replay through the rules engine, for games the byte board cannot follow.

use shakmaty::{Chess, Color, EnPassantMode, Position};

use super::{compact::CompactMove, quick::board_bytes, Replay, SearchTarget};

#[derive(Debug, Clone, Default)]
pub struct SlowBoard {
    position: Chess,
}

impl SlowBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }
}

impl Replay for SlowBoard {
    fn advance(&mut self, mv: CompactMove) -> bool {
        match mv.to_move(&self.position) {
            Some(mv) => {
                self.position.play_unchecked(&mv);
                true
            }
            None => false,
        }
    }

    fn matches(&self, target: &SearchTarget) -> bool {
        self.position.board() == &target.board
            && (self.position.turn() == Color::White) == target.white_to_move
            && self.position.castles().castling_rights().0 == target.castling
            && self
                .position
                .ep_square(EnPassantMode::PseudoLegal)
                .map(u8::from)
                == target.ep_square
    }

    fn squares(&self) -> [u8; 64] {
        board_bytes(self.position.board())
    }

    fn counts(&self) -> [u8; 2] {
        let board = self.position.board();
        [board.white().count() as u8, board.black().count() as u8]
    }

    fn home_pawns(&self) -> u16 {
        let board = self.position.board();
        let white = ((board.pawns() & board.white()).0 >> 8) & 0xff;
        let black = ((board.pawns() & board.black()).0 >> 48) & 0xff;
        (white | black << 8) as u16
    }
}
