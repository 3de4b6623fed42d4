use shakmaty::{Chess, Move, Position};

use crate::error::{Error, Result};

/// Encode a move as its index among the legal moves of `chess`.
/// There are never more than 218 legal moves, so one byte is enough.
pub fn encode_move(mv: &Move, chess: &Chess) -> Option<u8> {
    let legal_moves = chess.legal_moves();
    legal_moves
        .iter()
        .position(|legal| legal == mv)
        .and_then(|index| u8::try_from(index).ok())
}

/// Decode a single move from byte representation
pub fn decode_move(byte: u8, chess: &Chess) -> Option<Move> {
    let legal_moves = chess.legal_moves();
    legal_moves.get(byte as usize).cloned()
}

/// Encode a whole mainline played from the standard starting position.
pub fn encode_moves(moves: &[Move]) -> Result<Vec<u8>> {
    let mut chess = Chess::default();
    let mut bytes = Vec::with_capacity(moves.len());
    for (ply, mv) in moves.iter().enumerate() {
        let byte = encode_move(mv, &chess).ok_or(Error::UnencodableMove { ply })?;
        bytes.push(byte);
        chess.play_unchecked(mv);
    }
    Ok(bytes)
}

pub fn decode_moves(bytes: &[u8]) -> Result<Vec<Move>> {
    let mut chess = Chess::default();
    let mut moves = Vec::with_capacity(bytes.len());
    for (ply, &byte) in bytes.iter().enumerate() {
        let mv = decode_move(byte, &chess).ok_or(Error::CorruptMoves { ply, byte })?;
        chess.play_unchecked(&mv);
        moves.push(mv);
    }
    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{san::San, Square};

    fn moves(sans: &[&str]) -> Vec<Move> {
        let mut chess = Chess::default();
        sans.iter()
            .map(|san| {
                let mv = san.parse::<San>().unwrap().to_move(&chess).unwrap();
                chess.play_unchecked(&mv);
                mv
            })
            .collect()
    }

    #[test]
    fn castling_and_captures_survive_storage() {
        let game = moves(&["e4", "d5", "exd5", "Qxd5", "Nc3", "Qa5", "Nf3", "Nf6", "Bc4", "Bg4", "O-O"]);
        let bytes = encode_moves(&game).unwrap();
        assert_eq!(bytes.len(), game.len());
        assert_eq!(decode_moves(&bytes).unwrap(), game);
    }

    #[test]
    fn out_of_range_byte_is_reported_with_its_ply() {
        let mut bytes = encode_moves(&moves(&["d4", "d5"])).unwrap();
        bytes.push(250);
        assert!(matches!(
            decode_moves(&bytes),
            Err(Error::CorruptMoves { ply: 2, byte: 250 })
        ));
    }

    #[test]
    fn illegal_move_cannot_be_encoded() {
        let mv = Move::Normal {
            role: shakmaty::Role::Queen,
            from: Square::D1,
            capture: None,
            to: Square::D5,
            promotion: None,
        };
        assert_eq!(encode_move(&mv, &Chess::default()), None);
        assert!(matches!(
            encode_moves(&[mv]),
            Err(Error::UnencodableMove { ply: 0 })
        ));
    }
}
