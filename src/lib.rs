//! Chess game import and position indexing.
//!
//! - [`pgn`] streams games out of notation files, surviving malformed games.
//! - [`db`] stores games in SQLite, deduplicates them and indexes every
//!   position they pass through.
//! - [`search`] answers position queries over games held in memory, for
//!   collections that have no index.
//! - [`import`] ties reader and store together for whole files.

pub mod config;
pub mod db;
pub mod error;
pub mod hashing;
pub mod import;
pub mod pgn;
pub mod progress;
pub mod search;

pub use config::{Config, IndexConfig, ReaderConfig};
pub use db::{Database, GameRecord, IngestSession, IngestStats, InsertOutcome};
pub use error::{Error, Result};
pub use import::{append_to_database, create_database, ImportReport};
pub use pgn::{GameHeaders, GameSink, ParsedGame, PgnReader, ReaderStats};
pub use progress::{CancelFlag, LogProgress, NoProgress, Progress};
pub use search::{GameCache, MemoryPositionSearch, PiecePattern, SearchHit, SearchTarget};
