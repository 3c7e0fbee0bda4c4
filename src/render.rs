//! Record Renderer Module
//!
//! Writes output rows. Every row carries the report's merged metadata, the
//! record's own fields and a `host_name` column.
//!
//! CSV rows are separated by `;` with no quoting; `;` and line breaks are
//! removed from every value so the column count never changes. JSON rows are
//! one object per line holding the joined metadata under `meta`, then the
//! record fields and `host_name`.
use std::borrow::Cow;
use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::models::{MergedMeta, OutputFormat, Record, COLUMNS, NULL};

/// Field separator for CSV output and for the joined `meta` JSON field.
pub const DELIMITER: char = ';';

/// Removes characters that would break the line-oriented `;` format.
pub fn sanitize(value: &str) -> Cow<'_, str> {
    if value.contains(|c: char| c == DELIMITER || c == '\r' || c == '\n') {
        Cow::Owned(value.chars().filter(|&c| c != DELIMITER && c != '\r' && c != '\n').collect())
    } else {
        Cow::Borrowed(value)
    }
}

/// Host name for a record's source IP.
///
/// Reverse lookups are not performed; the column is always [`NULL`].
fn host_name(_source_ip: &str) -> &'static str {
    NULL
}

/// The metadata columns joined by [`DELIMITER`], sanitized.
pub fn joined_meta(meta: &MergedMeta) -> String {
    let separator = DELIMITER.to_string();
    meta.fields()
        .iter()
        .map(|f| sanitize(f))
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

#[derive(Serialize)]
struct JsonRow<'a> {
    meta: &'a str,
    #[serde(flatten)]
    record: &'a Record,
    host_name: &'a str,
}

/// Output sink for one report.
pub enum RowWriter<W: Write> {
    Csv(csv::Writer<W>),
    Json(W),
}

impl<W: Write> RowWriter<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        match format {
            OutputFormat::Csv => RowWriter::Csv(
                csv::WriterBuilder::new()
                    .delimiter(DELIMITER as u8)
                    .quote_style(csv::QuoteStyle::Never)
                    .terminator(csv::Terminator::Any(b'\n'))
                    .has_headers(false)
                    .from_writer(out),
            ),
            OutputFormat::Json => RowWriter::Json(out),
        }
    }

    /// Writes the column header. JSON rows are self-describing and get none.
    pub fn write_header(&mut self) -> Result<()> {
        if let RowWriter::Csv(wtr) = self {
            wtr.write_record(COLUMNS)?;
        }
        Ok(())
    }

    pub fn write_row(&mut self, meta: &MergedMeta, record: &Record) -> Result<()> {
        let host = host_name(&record.source_ip);
        match self {
            RowWriter::Csv(wtr) => {
                let fields = meta.fields().into_iter().chain(record.fields()).chain([host]);
                for field in fields {
                    wtr.write_field(sanitize(field).as_bytes())?;
                }
                wtr.write_record(None::<&[u8]>)?;
            }
            RowWriter::Json(out) => {
                let joined = joined_meta(meta);
                let row = JsonRow { meta: &joined, record, host_name: host };
                serde_json::to_writer(&mut *out, &row)?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            RowWriter::Csv(wtr) => wtr.flush()?,
            RowWriter::Json(out) => out.flush()?,
        }
        Ok(())
    }
}
