//! ZIP Handler Module
//!
//! This module resolves the input path to a plain XML file. DMARC reports are
//! commonly delivered as a ZIP archive holding exactly one report or as a GZIP
//! stream; both are extracted into a scratch directory that is removed when the
//! returned [`ResolvedInput`] is dropped. Extraction enforces a decompressed
//! size limit, a compression ratio limit, a member name length limit and path
//! traversal prevention.
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;
use zip::ZipArchive;

use crate::config::Config;
use crate::error::{DmarcError, Result};

/// An XML report path, plus the scratch directory backing it if it was extracted.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl ResolvedInput {
    /// Path of the XML document to parse.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the document lives in a scratch directory rather than at the caller's path.
    pub fn is_extracted(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Resolves `file_path` to an XML file, extracting it if it is compressed.
///
/// # Errors
///
/// - `Archive` if a ZIP does not hold exactly one file, or its member name is unsafe.
/// - `FileTooLarge` if the decompressed size or compression ratio exceeds the limits.
/// - `Io`/`Zip` for unreadable input.
pub fn resolve_input<P: AsRef<Path>>(file_path: P, config: &Config) -> Result<ResolvedInput> {
    let file_path = file_path.as_ref();
    let ext = file_path
        .extension()
        .map(|x| x.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "zip" => extract_zip(file_path, config),
        "gz" => extract_gzip(file_path, config),
        _ => {
            log::debug!("Using {} as plain XML", file_path.display());
            Ok(ResolvedInput { path: file_path.to_path_buf(), scratch: None })
        }
    }
}

fn extract_zip(file_path: &Path, config: &Config) -> Result<ResolvedInput> {
    let file = File::open(file_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    if archive.len() != 1 {
        return Err(DmarcError::Archive(format!(
            "expected exactly one report in {}, found {} entries",
            file_path.display(),
            archive.len()
        )));
    }

    let mut file_in_zip = archive.by_index(0)?;
    let inner_name = file_in_zip.name().to_string();
    if file_in_zip.is_dir() {
        return Err(DmarcError::Archive(format!("Archive entry is a directory: {}", inner_name)));
    }
    // Prevent path traversal
    let enclosed = match file_in_zip.enclosed_name() {
        Some(p) if !inner_name.contains("..") => p,
        _ => {
            return Err(DmarcError::Archive(format!("Path traversal attempt detected: {}", inner_name)));
        }
    };
    if inner_name.len() > config.max_filename_length {
        return Err(DmarcError::Archive("Filename too long".to_string()));
    }

    let compressed_size = file_in_zip.compressed_size();
    let uncompressed_size = file_in_zip.size();
    if compressed_size > 0 {
        let compression_ratio = uncompressed_size as f64 / compressed_size as f64;
        if compression_ratio > config.max_compression_ratio {
            return Err(DmarcError::FileTooLarge(format!(
                "Suspicious compression ratio: {:.2}",
                compression_ratio
            )));
        }
    }
    if uncompressed_size > config.max_decompressed_size {
        return Err(DmarcError::FileTooLarge("Total decompressed size too large".to_string()));
    }

    let member_name = enclosed
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| DmarcError::Archive(format!("Archive entry has no file name: {}", inner_name)))?;

    let scratch = TempDir::new()?;
    let target = scratch.path().join(member_name);
    let written = copy_limited(&mut file_in_zip, &target, config.max_decompressed_size)?;
    log::info!("Extracted {} ({} bytes) from {}", inner_name, written, file_path.display());

    Ok(ResolvedInput { path: target, scratch: Some(scratch) })
}

fn extract_gzip(file_path: &Path, config: &Config) -> Result<ResolvedInput> {
    let file = File::open(file_path)?;
    let mut gz_decoder = GzDecoder::new(BufReader::new(file));

    let member_name = match file_path.file_stem() {
        Some(stem) if stem != "." && stem != ".." => stem.to_os_string(),
        _ => "report.xml".into(),
    };

    let scratch = TempDir::new()?;
    let target = scratch.path().join(member_name);
    let written = copy_limited(&mut gz_decoder, &target, config.max_decompressed_size)?;
    log::info!("Decompressed {} ({} bytes)", file_path.display(), written);

    Ok(ResolvedInput { path: target, scratch: Some(scratch) })
}

/// Streams `reader` into a new file at `target`, failing once more than `limit` bytes arrive.
fn copy_limited<R: Read>(reader: &mut R, target: &Path, limit: u64) -> Result<u64> {
    let mut writer = BufWriter::new(File::create(target)?);
    let written = io::copy(&mut reader.take(limit.saturating_add(1)), &mut writer)?;
    if written > limit {
        return Err(DmarcError::FileTooLarge(format!(
            "Decompressed size exceeds limit of {} bytes",
            limit
        )));
    }
    writer.flush()?;
    Ok(written)
}
