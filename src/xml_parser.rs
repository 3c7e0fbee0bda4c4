//! XML Parser Module
//!
//! Streaming extraction of DMARC aggregate reports using quick-xml.
//!
//! Reports can be large, so the document is never loaded as a whole. An
//! [`ElementCursor`] pulls events from the file and, when it meets one of the
//! requested tags, captures only that element's subtree into a small
//! [`Element`] tree. The caller reads the fixed sub-paths it needs and drops the
//! tree before the next one is captured, so memory stays proportional to the
//! largest single block.
//!
//! Two independent passes are made over the same file:
//! - [`read_metadata`] stops as soon as both `report_metadata` and
//!   `policy_published` have been seen.
//! - [`RecordIter`] yields one [`Record`] per `record` element, in document order.
//!
//! The reader is lenient: end tag names are not checked, tag names are matched
//! on their local part (namespace prefixes ignored), and text with unknown
//! entities is kept raw.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Result;
use crate::models::{MergedMeta, PolicyPublished, Record, ReportMetadata, NULL};

const REPORT_METADATA: &str = "report_metadata";
const POLICY_PUBLISHED: &str = "policy_published";
const RECORD: &str = "record";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A captured element: its local name, direct text and child elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Element { name, ..Default::default() }
    }

    /// Finds the first descendant matching a `/`-separated child path, in document order.
    pub fn find(&self, path: &str) -> Option<&Element> {
        let steps: Vec<&str> = path.split('/').collect();
        self.find_steps(&steps)
    }

    fn find_steps(&self, steps: &[&str]) -> Option<&Element> {
        match steps.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .children
                .iter()
                .filter(|child| child.name == *head)
                .find_map(|child| child.find_steps(rest)),
        }
    }

    /// Text at `path`; empty if the element has no text, [`NULL`] if it is absent.
    pub fn find_text(&self, path: &str) -> String {
        self.find(path)
            .map(|e| e.text.clone())
            .unwrap_or_else(|| NULL.to_string())
    }
}

/// Forward-only cursor that captures whole subtrees of selected elements.
pub struct ElementCursor<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl ElementCursor<BufReader<File>> {
    /// Open a file for streaming
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)))
    }
}

impl<R: BufRead> ElementCursor<R> {
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        let config = xml_reader.config_mut();
        config.trim_text(true);
        config.expand_empty_elements = true;
        config.check_end_names = false;

        Self { reader: xml_reader, buf: Vec::new() }
    }

    /// Advances to the next element whose local name is in `wanted` and returns
    /// its captured subtree, or `None` at end of document.
    pub fn next_element(&mut self, wanted: &[&str]) -> Result<Option<Element>> {
        loop {
            self.buf.clear();
            let name = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => local_name(e),
                Event::Eof => return Ok(None),
                _ => continue,
            };
            if wanted.contains(&name.as_str()) {
                return self.capture(name).map(Some);
            }
        }
    }

    /// Reads events up to the end of the element that was just opened.
    fn capture(&mut self, name: String) -> Result<Element> {
        let mut stack = vec![Element::new(name)];
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => stack.push(Element::new(local_name(e))),
                Event::Text(ref t) => {
                    if let Some(top) = stack.last_mut() {
                        match t.unescape() {
                            Ok(text) => top.text.push_str(&text),
                            Err(_) => top.text.push_str(&String::from_utf8_lossy(t)),
                        }
                    }
                }
                Event::CData(ref c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(c));
                    }
                }
                Event::End(_) => {
                    if let Some(done) = close(&mut stack) {
                        return Ok(done);
                    }
                }
                Event::Eof => {
                    // Truncated document: close whatever is still open.
                    loop {
                        if let Some(done) = close(&mut stack) {
                            return Ok(done);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Pops the innermost open element. Returns it once the outermost one closes.
fn close(stack: &mut Vec<Element>) -> Option<Element> {
    let mut done = stack.pop()?;
    done.text = done.text.trim().to_string();
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(done);
            None
        }
        None => Some(done),
    }
}

fn report_metadata(elem: &Element) -> ReportMetadata {
    ReportMetadata {
        org_name: elem.find_text("org_name"),
        email: elem.find_text("email"),
        extra_contact_info: elem.find_text("extra_contact_info"),
        report_id: elem.find_text("report_id"),
        date_range_begin: elem.find_text("date_range/begin"),
        date_range_end: elem.find_text("date_range/end"),
    }
}

fn policy_published(elem: &Element) -> PolicyPublished {
    PolicyPublished {
        domain: elem.find_text("domain"),
        adkim: elem.find_text("adkim"),
        aspf: elem.find_text("aspf"),
        p: elem.find_text("p"),
        pct: elem.find_text("pct"),
    }
}

fn record(elem: &Element) -> Record {
    Record {
        source_ip: elem.find_text("row/source_ip"),
        count: elem.find_text("row/count"),
        disposition: elem.find_text("row/policy_evaluated/disposition"),
        dkim: elem.find_text("row/policy_evaluated/dkim"),
        spf: elem.find_text("row/policy_evaluated/spf"),
        reason_type: elem.find_text("row/policy_evaluated/reason/type"),
        comment: elem.find_text("row/policy_evaluated/reason/comment"),
        envelope_to: elem.find_text("identifiers/envelope_to"),
        header_from: elem.find_text("identifiers/header_from"),
        dkim_domain: elem.find_text("auth_results/dkim/domain"),
        dkim_result: elem.find_text("auth_results/dkim/result"),
        dkim_human_result: elem.find_text("auth_results/dkim/human_result"),
        spf_domain: elem.find_text("auth_results/spf/domain"),
        spf_result: elem.find_text("auth_results/spf/result"),
    }
}

/// Scans `path` for the report metadata and published policy.
///
/// Returns `Ok(None)` if the document ends before both blocks were seen. The
/// rest of the document is not read once both are found.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<Option<MergedMeta>> {
    read_metadata_from(ElementCursor::open(path)?)
}

/// Same as [`read_metadata`], over an already opened cursor.
///
/// A repeated block before both have been found replaces the earlier one.
pub fn read_metadata_from<R: BufRead>(mut cursor: ElementCursor<R>) -> Result<Option<MergedMeta>> {
    let mut report: Option<ReportMetadata> = None;
    let mut policy: Option<PolicyPublished> = None;

    while let Some(elem) = cursor.next_element(&[REPORT_METADATA, POLICY_PUBLISHED])? {
        if elem.name == REPORT_METADATA {
            if report.is_some() {
                log::warn!("Duplicate <report_metadata> block, keeping the latest");
            }
            report = Some(report_metadata(&elem));
        } else {
            if policy.is_some() {
                log::warn!("Duplicate <policy_published> block, keeping the latest");
            }
            policy = Some(policy_published(&elem));
        }

        if let (Some(r), Some(p)) = (&report, &policy) {
            log::debug!(
                "Report {} from {} for {}, window {} .. {}",
                r.report_id,
                r.org_name,
                p.domain,
                format_timestamp(&r.date_range_begin),
                format_timestamp(&r.date_range_end)
            );
            return Ok(Some(MergedMeta::new(r.clone(), p.clone())));
        }
    }

    Ok(None)
}

/// Renders an epoch-seconds field for logs, leaving anything else as is.
fn format_timestamp(value: &str) -> String {
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| value.to_string())
}

/// Lazy sequence of the `record` elements of a report.
///
/// Each call to `next` reads only as far as the end of the next record. After
/// an error the iterator is finished. Reopen the file to start over.
pub struct RecordIter<R: BufRead> {
    cursor: ElementCursor<R>,
    finished: bool,
}

impl RecordIter<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ElementCursor::open(path)?))
    }
}

impl<R: BufRead> RecordIter<R> {
    pub fn new(cursor: ElementCursor<R>) -> Self {
        Self { cursor, finished: false }
    }
}

impl<R: BufRead> Iterator for RecordIter<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.cursor.next_element(&[RECORD]) {
            Ok(Some(elem)) => Some(Ok(record(&elem))),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
