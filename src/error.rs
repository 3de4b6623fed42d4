use std::path::PathBuf;

use shakmaty::Chess;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Fen(#[from] shakmaty::fen::ParseFenError),

    #[error(transparent)]
    Position(#[from] shakmaty::PositionError<Chess>),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Stored move byte {byte} is not a legal move at ply {ply}")]
    CorruptMoves { ply: usize, byte: u8 },

    #[error("Move at ply {ply} is not legal and cannot be encoded")]
    UnencodableMove { ply: usize },

    #[error("Database file {0} already exists")]
    DatabaseExists(PathBuf),

    #[error("No game files specified")]
    NoGameFiles,

    #[error("Import cancelled")]
    ImportCancelled,

    #[error("Search stopped")]
    SearchStopped,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
