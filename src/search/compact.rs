use shakmaty::{Chess, Move, Position, Role, Square};

/// A move packed into 16 bits: origin in bits 0-5, target in bits 6-11 and
/// the move kind in bits 12-15.
///
/// Castling is stored king square to rook square, the same way the rules
/// engine represents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactMove(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Normal,
    EnPassant,
    Castle,
    Promotion(Role),
}

impl MoveKind {
    fn bits(self) -> u16 {
        match self {
            MoveKind::Normal => 0,
            MoveKind::EnPassant => 1,
            MoveKind::Castle => 2,
            MoveKind::Promotion(Role::Knight) => 3,
            MoveKind::Promotion(Role::Bishop) => 4,
            MoveKind::Promotion(Role::Rook) => 5,
            MoveKind::Promotion(Role::Queen) => 6,
            MoveKind::Promotion(Role::King) => 7,
            MoveKind::Promotion(Role::Pawn) => 8,
        }
    }

    fn from_bits(bits: u16) -> MoveKind {
        match bits {
            1 => MoveKind::EnPassant,
            2 => MoveKind::Castle,
            3 => MoveKind::Promotion(Role::Knight),
            4 => MoveKind::Promotion(Role::Bishop),
            5 => MoveKind::Promotion(Role::Rook),
            6 => MoveKind::Promotion(Role::Queen),
            7 => MoveKind::Promotion(Role::King),
            8 => MoveKind::Promotion(Role::Pawn),
            _ => MoveKind::Normal,
        }
    }
}

impl CompactMove {
    pub fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Self(u16::from(from) | u16::from(to) << 6 | kind.bits() << 12)
    }

    /// `None` for drops, which never occur in standard chess.
    pub fn from_move(mv: &Move) -> Option<Self> {
        match *mv {
            Move::Normal {
                from,
                to,
                promotion,
                ..
            } => Some(Self::new(
                from,
                to,
                promotion.map_or(MoveKind::Normal, MoveKind::Promotion),
            )),
            Move::EnPassant { from, to } => Some(Self::new(from, to, MoveKind::EnPassant)),
            Move::Castle { king, rook } => Some(Self::new(king, rook, MoveKind::Castle)),
            Move::Put { .. } => None,
        }
    }

    #[inline]
    pub fn from_index(self) -> usize {
        usize::from(self.0 & 63)
    }

    #[inline]
    pub fn to_index(self) -> usize {
        usize::from(self.0 >> 6 & 63)
    }

    pub fn from(self) -> Square {
        Square::new(u32::from(self.0 & 63))
    }

    pub fn to(self) -> Square {
        Square::new(u32::from(self.0 >> 6 & 63))
    }

    #[inline]
    pub fn kind(self) -> MoveKind {
        MoveKind::from_bits(self.0 >> 12)
    }

    pub fn is_promotion(self) -> bool {
        matches!(self.kind(), MoveKind::Promotion(_))
    }

    /// Rebuilds the full move in `position`. Returns `None` if the result
    /// is not legal there.
    pub fn to_move(self, position: &Chess) -> Option<Move> {
        let (from, to) = (self.from(), self.to());
        let mv = match self.kind() {
            MoveKind::Castle => Move::Castle {
                king: from,
                rook: to,
            },
            MoveKind::EnPassant => Move::EnPassant { from, to },
            kind => Move::Normal {
                role: position.board().role_at(from)?,
                from,
                capture: position.board().role_at(to),
                to,
                promotion: match kind {
                    MoveKind::Promotion(role) => Some(role),
                    _ => None,
                },
            },
        };
        position.is_legal(&mv).then_some(mv)
    }
}

/// Packs a mainline. Stops at the first move that cannot be represented.
pub fn compact_moves(moves: &[Move]) -> Vec<CompactMove> {
    moves.iter().map_while(CompactMove::from_move).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{fen::Fen, CastlingMode};

    fn position(fen: &str) -> Chess {
        fen.parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap()
    }

    #[test]
    fn every_legal_move_survives_packing() {
        for fen in [
            "r3k2r/pPppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        ] {
            let chess = position(fen);
            for mv in chess.legal_moves() {
                let packed = CompactMove::from_move(&mv).unwrap();
                assert_eq!(packed.to_move(&chess), Some(mv));
            }
        }
    }

    #[test]
    fn fields_are_recovered() {
        let mv = CompactMove::new(Square::B7, Square::A8, MoveKind::Promotion(Role::Queen));
        assert_eq!(mv.from(), Square::B7);
        assert_eq!(mv.to(), Square::A8);
        assert_eq!(mv.from_index(), 49);
        assert_eq!(mv.to_index(), 56);
        assert!(mv.is_promotion());
    }

    #[test]
    fn stale_move_is_rejected() {
        let chess = Chess::default();
        let mv = CompactMove::new(Square::E2, Square::E5, MoveKind::Normal);
        assert_eq!(mv.to_move(&chess), None);
    }
}
