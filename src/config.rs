//! Tunables for the reader and the position index.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a working configuration.

use std::{fs::File, io::BufReader, path::Path};

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reader: ReaderConfig,
    pub index: IndexConfig,
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Config> {
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.index.validate()?;
        Ok(config)
    }
}

/// Fixed capacities of the notation reader. Exceeding any of them fails the
/// current game only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct ReaderConfig {
    #[derivative(Default(value = "20"))]
    pub max_variation_depth: usize,
    #[derivative(Default(value = "1000"))]
    pub max_token_len: usize,
    #[derivative(Default(value = "1000"))]
    pub max_plies: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of `positions_<n>` tables. Must be a power of two.
    #[derivative(Default(value = "4096"))]
    pub nbr_buckets: usize,
    /// Pending entries that force an early flush of one bucket.
    #[derivative(Default(value = "10_000"))]
    pub purge_quota: usize,
    /// Games where both players are rated below this are not indexed.
    #[derivative(Default(value = "2000"))]
    pub strength_floor: u32,
    #[derivative(Default(value = "3"))]
    pub min_plies: usize,
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.nbr_buckets.is_power_of_two() || self.nbr_buckets > 1 << 16 {
            return Err(Error::InvalidConfig(format!(
                "nbr_buckets must be a power of two no larger than 65536, got {}",
                self.nbr_buckets
            )));
        }
        if self.purge_quota == 0 {
            return Err(Error::InvalidConfig("purge_quota must be non-zero".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn bucket_mask(&self) -> u64 {
        (self.nbr_buckets - 1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.index.nbr_buckets, 4096);
        assert_eq!(config.index.purge_quota, 10_000);
        assert_eq!(config.index.strength_floor, 2000);
        assert_eq!(config.index.min_plies, 3);
        assert_eq!(config.reader.max_variation_depth, 20);
        assert!(config.index.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "index": { "nbr_buckets": 16 } }"#).unwrap();
        assert_eq!(config.index.nbr_buckets, 16);
        assert_eq!(config.index.purge_quota, 10_000);
        assert_eq!(config.reader, ReaderConfig::default());
    }

    #[test]
    fn rejects_bad_bucket_count() {
        let index = IndexConfig {
            nbr_buckets: 1000,
            ..IndexConfig::default()
        };
        assert!(matches!(index.validate(), Err(Error::InvalidConfig(_))));
    }
}
