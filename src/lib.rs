//! dmarc2logger Library
//!
//! This library flattens DMARC aggregate reports into line-oriented records for
//! log ingestion. It covers input resolution (ZIP/GZIP extraction), input
//! normalization, streaming XML extraction, row rendering and configuration.

pub mod config;
pub mod convert;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod render;
pub mod xml_parser;
pub mod zip_handler;

pub use config::Config;
pub use convert::{convert_report, Options};
pub use error::DmarcError;
pub use normalizer::normalize_file;
pub use render::RowWriter;
pub use xml_parser::{read_metadata, RecordIter};
pub use zip_handler::resolve_input;
