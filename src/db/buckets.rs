//! Deferred, batched writes into the `positions_<n>` tables.
//!
//! A position hash is split into a bucket selector taken from the high word
//! and an in-bucket key made of the low 32 bits. Keys are unsigned bit
//! patterns: they are sorted as `u32` and stored as non-negative integers.

use log::trace;
use rusqlite::{params, Connection};

use crate::{config::IndexConfig, error::Result};

pub fn bucket_table(bucket: usize) -> String {
    format!("positions_{bucket}")
}

/// Bucket selector and in-bucket key of `hash` for `nbr_buckets` buckets.
#[inline]
pub fn split_hash(hash: u64, nbr_buckets: usize) -> (usize, u32) {
    let bucket = ((hash >> 32) & (nbr_buckets as u64 - 1)) as usize;
    (bucket, hash as u32)
}

#[derive(Debug)]
pub struct Buckets {
    pending: Vec<Vec<(u32, i64)>>,
    quota: usize,
}

impl Buckets {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            pending: vec![Vec::new(); config.nbr_buckets],
            quota: config.purge_quota,
        }
    }

    pub fn nbr_buckets(&self) -> usize {
        self.pending.len()
    }

    /// Total entries waiting to be written.
    pub fn pending(&self) -> usize {
        self.pending.iter().map(Vec::len).sum()
    }

    /// Queues one position of `game_id`. The bucket is written out as soon
    /// as it reaches the purge quota. Returns the number of rows written.
    pub fn push(&mut self, conn: &Connection, hash: u64, game_id: i64) -> Result<usize> {
        let (bucket, key) = split_hash(hash, self.pending.len());
        let list = &mut self.pending[bucket];
        list.push((key, game_id));
        if list.len() >= self.quota {
            self.flush(conn, bucket)
        } else {
            Ok(0)
        }
    }

    /// Writes one bucket in key order and empties it.
    ///
    /// The list is emptied before the first row is written, so a failed
    /// flush loses its pairs instead of writing some of them twice later.
    /// The caller is expected to roll back.
    pub fn flush(&mut self, conn: &Connection, bucket: usize) -> Result<usize> {
        let mut list = std::mem::take(&mut self.pending[bucket]);
        if list.is_empty() {
            return Ok(0);
        }
        list.sort_unstable();

        let mut stmt = conn.prepare_cached(&format!(
            "INSERT INTO {} (game_id, position_hash) VALUES (?1, ?2)",
            bucket_table(bucket)
        ))?;
        for (key, game_id) in &list {
            stmt.execute(params![game_id, i64::from(*key)])?;
        }

        trace!("Flushed {} positions into bucket {}", list.len(), bucket);
        Ok(list.len())
    }

    pub fn flush_all(&mut self, conn: &Connection) -> Result<usize> {
        let mut written = 0;
        for bucket in 0..self.pending.len() {
            written += self.flush(conn, bucket)?;
        }
        Ok(written)
    }
}
