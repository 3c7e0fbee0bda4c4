//! Conversion Module
//!
//! Runs one report through the whole pipeline: resolve (and extract) the input,
//! normalize it, read the metadata in a first pass, then stream the records in
//! a second pass and write one row per record.
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::{DmarcError, Result};
use crate::models::OutputFormat;
use crate::normalizer::normalize_file;
use crate::render::RowWriter;
use crate::xml_parser::{read_metadata, RecordIter};
use crate::zip_handler::resolve_input;

/// Per-run options chosen on the command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub format: OutputFormat,
    /// Delete the caller's input file after a successful run.
    pub remove_input: bool,
}

/// Converts the report at `input` and writes its rows to `out`.
///
/// Returns the number of records written. Nothing is written to `out` when the
/// report lacks its metadata blocks; that case is reported as
/// [`DmarcError::MissingMetadata`]. Any scratch directory used for extraction is
/// removed before this returns, whatever the outcome.
pub fn convert_report<W: Write>(input: &Path, options: &Options, config: &Config, out: W) -> Result<usize> {
    let count = {
        let resolved = resolve_input(input, config)?;
        let report = resolved.path();
        if resolved.is_extracted() {
            log::debug!("Reading {} extracted from {}", report.display(), input.display());
        }
        normalize_file(report)?;

        let meta = read_metadata(report)?.ok_or_else(|| DmarcError::MissingMetadata {
            file: input.to_path_buf(),
        })?;

        let mut writer = RowWriter::new(options.format, out);
        writer.write_header()?;
        let mut count = 0;
        for record in RecordIter::open(report)? {
            writer.write_row(&meta, &record?)?;
            count += 1;
        }
        writer.flush()?;
        count
    };
    log::debug!("Wrote {} record(s) from {}", count, input.display());

    if options.remove_input {
        fs::remove_file(input)?;
        log::info!("Removed input file {}", input.display());
    }
    Ok(count)
}
