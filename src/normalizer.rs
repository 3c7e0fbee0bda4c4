//! Input Normalizer Module
//!
//! Some report generators emit a stray quote before an inline schema element
//! (`>" <xs`). This module rewrites that sequence to `> <xs` before parsing.
//! The file is streamed in fixed-size chunks, so reports written on a single
//! line are handled in bounded memory, and the original is replaced atomically.
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{DmarcError, Result};

const MALFORMED: &[u8] = b">\" <xs";
const CORRECTED: &[u8] = b"> <xs";

const CHUNK_SIZE: usize = 64 * 1024;

/// Rewrites every malformed sequence in `path` and returns how many were fixed.
///
/// The file is first scanned read-only. Only if something needs fixing is the
/// corrected content written to a temporary file next to the input and renamed
/// over it, so the original name never points at a partial file.
pub fn normalize_file<P: AsRef<Path>>(path: P) -> Result<usize> {
    let path = path.as_ref();

    let found = scan_chunks(File::open(path)?, |_| Ok(()))?;
    if found == 0 {
        log::debug!("Normalizer: nothing to fix in {}", path.display());
        return Ok(0);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
    let replaced = scan_chunks(BufReader::new(File::open(path)?), |fixed| writer.write_all(fixed))?;

    let temp = writer.into_inner().map_err(|e| DmarcError::Io(e.into_error()))?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), fs::metadata(path)?.permissions())?;
    temp.persist(path).map_err(|e| DmarcError::Io(e.error))?;

    log::debug!("Normalizer: fixed {} malformed sequence(s) in {}", replaced, path.display());
    Ok(replaced)
}

/// Streams `reader` chunk by chunk, handing the corrected bytes to `emit`.
///
/// The last `MALFORMED.len() - 1` bytes of each chunk are held back until the
/// next one arrives, so a sequence split across two reads is still replaced.
fn scan_chunks<R, F>(mut reader: R, mut emit: F) -> Result<usize>
where
    R: Read,
    F: FnMut(&[u8]) -> io::Result<()>,
{
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + MALFORMED.len());
    let mut fixed: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + MALFORMED.len());
    let mut count = 0;
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let eof = n == 0;
        pending.extend_from_slice(&chunk[..n]);

        let keep = if eof { 0 } else { MALFORMED.len() - 1 };
        fixed.clear();
        let (consumed, replaced) = replace_malformed(&pending, keep, &mut fixed);
        count += replaced;
        emit(&fixed)?;
        pending.drain(..consumed);

        if eof {
            return Ok(count);
        }
    }
}

/// Copies `input` into `out`, replacing each malformed sequence, and stops
/// with `keep` bytes left over. Returns the bytes consumed and the replacements made.
fn replace_malformed(input: &[u8], keep: usize, out: &mut Vec<u8>) -> (usize, usize) {
    let mut count = 0;
    let mut i = 0;
    while input.len() - i > keep {
        if input[i..].starts_with(MALFORMED) {
            out.extend_from_slice(CORRECTED);
            i += MALFORMED.len();
            count += 1;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    (i, count)
}
