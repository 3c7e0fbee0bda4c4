//! Data Models Module
//!
//! This module defines the fixed-shape values extracted from a DMARC aggregate
//! report: the report metadata, the published policy, their merged form that is
//! attached to every output row, and the per-source-IP record.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder emitted for any field absent from the report.
pub const NULL: &str = "NULL";

/// Canonical output column names, in output order.
pub const COLUMNS: [&str; 25] = [
    "org_name",
    "email",
    "extra_contact_info",
    "date_range_begin",
    "date_range_end",
    "domain",
    "adkim",
    "aspf",
    "p",
    "pct",
    "source_ip",
    "count",
    "disposition",
    "dkim",
    "spf",
    "reason_type",
    "comment",
    "envelope_to",
    "header_from",
    "dkim_domain",
    "dkim_result",
    "dkim_human_result",
    "spf_domain",
    "spf_result",
    "host_name",
];

/// Contents of the `<report_metadata>` block.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportMetadata {
    pub org_name: String,
    pub email: String,
    pub extra_contact_info: String,
    pub report_id: String,
    pub date_range_begin: String,
    pub date_range_end: String,
}

/// Contents of the `<policy_published>` block.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PolicyPublished {
    pub domain: String,
    pub adkim: String,
    pub aspf: String,
    pub p: String,
    pub pct: String,
}

/// Report metadata and published policy, shared by every row of one report.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MergedMeta {
    pub report: ReportMetadata,
    pub policy: PolicyPublished,
}

impl MergedMeta {
    pub fn new(report: ReportMetadata, policy: PolicyPublished) -> Self {
        MergedMeta { report, policy }
    }

    /// The metadata columns in output order. `report_id` is not an output column.
    pub fn fields(&self) -> [&str; 10] {
        let r = &self.report;
        let p = &self.policy;
        [
            &r.org_name,
            &r.email,
            &r.extra_contact_info,
            &r.date_range_begin,
            &r.date_range_end,
            &p.domain,
            &p.adkim,
            &p.aspf,
            &p.p,
            &p.pct,
        ]
    }
}

/// One `<record>` block. Field names double as the output column names.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Record {
    pub source_ip: String,
    pub count: String,
    pub disposition: String,
    pub dkim: String,
    pub spf: String,
    pub reason_type: String,
    pub comment: String,
    pub envelope_to: String,
    pub header_from: String,
    pub dkim_domain: String,
    pub dkim_result: String,
    pub dkim_human_result: String,
    pub spf_domain: String,
    pub spf_result: String,
}

impl Record {
    /// The record columns in output order.
    pub fn fields(&self) -> [&str; 14] {
        [
            &self.source_ip,
            &self.count,
            &self.disposition,
            &self.dkim,
            &self.spf,
            &self.reason_type,
            &self.comment,
            &self.envelope_to,
            &self.header_from,
            &self.dkim_domain,
            &self.dkim_result,
            &self.dkim_human_result,
            &self.spf_domain,
            &self.spf_result,
        ]
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `;`-separated lines preceded by a header line.
    #[default]
    Csv,
    /// One JSON object per line.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("CSV"), Ok(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_str("csv"), Ok(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_str("json"), Ok(OutputFormat::Json));
        assert!(OutputFormat::from_str("table").is_err());
    }

    #[test]
    fn test_field_counts_match_columns() {
        let meta = MergedMeta::new(
            ReportMetadata {
                org_name: "ACME".into(),
                email: NULL.into(),
                extra_contact_info: NULL.into(),
                report_id: "1".into(),
                date_range_begin: NULL.into(),
                date_range_end: NULL.into(),
            },
            PolicyPublished {
                domain: "acme.test".into(),
                adkim: NULL.into(),
                aspf: NULL.into(),
                p: "reject".into(),
                pct: "100".into(),
            },
        );
        let fields = meta.fields();
        assert_eq!(fields[0], "ACME");
        assert_eq!(fields[5], "acme.test");
        assert_eq!(fields[9], "100");
        assert!(!fields.contains(&"1"));
        // metadata + record + host_name
        assert_eq!(fields.len() + 14 + 1, COLUMNS.len());
    }
}
