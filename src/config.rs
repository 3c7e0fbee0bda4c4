//! Configuration Module
//!
//! This module reads archive extraction limits from environment variables,
//! provides sensible defaults, and validates them.

use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_decompressed_size: u64,
    pub max_compression_ratio: f64,
    pub max_filename_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_decompressed_size: 1024 * 1024 * 1024,
            max_compression_ratio: 1000.0,
            max_filename_length: 256,
        }
    }
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    /// If a variable is missing or unparsable, the default value is used.
    pub fn new() -> Result<Self> {
        let defaults = Config::default();

        let max_decompressed_size = env::var("DMARC_MAX_DECOMPRESSED_SIZE")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_decompressed_size);

        if max_decompressed_size == 0 {
            return Err(anyhow::anyhow!("DMARC_MAX_DECOMPRESSED_SIZE must be greater than zero"));
        }

        let max_compression_ratio = env::var("DMARC_MAX_COMPRESSION_RATIO")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_compression_ratio);

        let max_filename_length = env::var("DMARC_MAX_FILENAME_LENGTH")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_filename_length);

        Ok(Config {
            max_decompressed_size,
            max_compression_ratio,
            max_filename_length,
        })
    }
}
