//! Building a position database from notation files.
//!
//! The pipeline opens (or creates) the database, ingests every file inside
//! one transaction, flushes the buckets, then builds the indexes:
//! open, begin, create tables, reset ids, parse each file, end, create
//! indexes, create extra indexes, close. When creating, a failed or
//! cancelled import removes the half written file.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
    time::Instant,
};

use log::{info, warn};
use serde::Serialize;

use crate::{
    config::Config,
    db::{Database, IngestSession, IngestStats},
    error::{Error, Result},
    pgn::{PgnReader, ReaderStats},
    progress::Progress,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub files: usize,
    pub reader: ReaderStats,
    pub ingest: IngestStats,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Append,
}

/// Opens a notation file, decompressing `.zst`, `.bz2` and `.gz` files on
/// the fly. Also returns the file size when it matches the byte count the
/// reader will see.
pub fn open_game_file(path: &Path) -> Result<(Box<dyn Read>, Option<u64>)> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let reader: (Box<dyn Read>, Option<u64>) = match ext.as_str() {
        "zst" => (Box::new(zstd::Decoder::new(file)?), None),
        "bz2" => (Box::new(bzip2::read::MultiBzDecoder::new(BufReader::new(file))), None),
        "gz" => (Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file))), None),
        _ => (Box::new(file), Some(size)),
    };
    Ok(reader)
}

/// Creates a new database at `db_path` from `pgn_paths`.
pub fn create_database(
    db_path: &Path,
    pgn_paths: &[PathBuf],
    config: &Config,
    progress: &mut dyn Progress,
) -> Result<ImportReport> {
    if db_path.exists() {
        return Err(Error::DatabaseExists(db_path.to_path_buf()));
    }
    let result = import(db_path, pgn_paths, config, progress, Mode::Create);
    if let Err(e) = &result {
        warn!("Creating {} failed: {}", db_path.display(), e);
        if db_path.exists() {
            if let Err(e) = fs::remove_file(db_path) {
                warn!("Could not remove {}: {}", db_path.display(), e);
            }
        }
    }
    result
}

/// Adds the games of `pgn_paths` to an existing database. A failure rolls
/// back everything added by this call.
pub fn append_to_database(
    db_path: &Path,
    pgn_paths: &[PathBuf],
    config: &Config,
    progress: &mut dyn Progress,
) -> Result<ImportReport> {
    import(db_path, pgn_paths, config, progress, Mode::Append)
}

fn import(
    db_path: &Path,
    pgn_paths: &[PathBuf],
    config: &Config,
    progress: &mut dyn Progress,
    mode: Mode,
) -> Result<ImportReport> {
    let start = Instant::now();
    config.index.validate()?;
    if pgn_paths.is_empty() {
        return Err(Error::NoGameFiles);
    }
    for path in pgn_paths {
        fs::metadata(path)?;
    }

    let mut db = match mode {
        Mode::Create => Database::create(db_path)?,
        Mode::Append => Database::open(db_path)?,
    };
    let mut index_config = config.index.clone();
    if db.nbr_buckets() == 0 {
        db.create_tables(index_config.nbr_buckets)?;
    } else if db.nbr_buckets() != index_config.nbr_buckets {
        info!(
            "{} has {} buckets, ignoring configured {}",
            db_path.display(),
            db.nbr_buckets(),
            index_config.nbr_buckets
        );
        index_config.nbr_buckets = db.nbr_buckets();
    }

    let mut session = IngestSession::new(&db, &index_config)?;
    session.begin()?;
    let mut reader_stats = ReaderStats::default();
    for path in pgn_paths {
        let (input, total) = open_game_file(path)?;
        progress.begin("Importing games", &path.display().to_string(), total);
        let mut reader = PgnReader::new(&config.reader);
        let aborted = reader.process(input, &mut session, progress)?;
        reader_stats += reader.stats();
        if aborted {
            session.abandon()?;
            return Err(Error::ImportCancelled);
        }
    }
    session.end()?;
    let ingest = session.close()?;

    db.create_indexes()?;
    db.create_extra_indexes()?;
    db.close()?;

    let message = format!(
        "Imported {} of {} games from {} file(s) in {:.1?}: {} duplicates skipped, {} games could not be read",
        ingest.games_accepted,
        reader_stats.games_completed,
        pgn_paths.len(),
        start.elapsed(),
        ingest.duplicates_folded,
        reader_stats.games_failed
    );
    info!("{}", message);
    Ok(ImportReport {
        files: pgn_paths.len(),
        reader: reader_stats,
        ingest,
        message,
    })
}
