/// Security tests for dmarc2logger.
///
/// This module verifies that input resolution and parsing are protected against
/// common attacks:
/// - ZIP Bombs (by enforcing decompression size and compression ratio limits)
/// - Directory Traversal attacks in archive filenames
/// - Archives smuggling more than one report
/// - XML External Entity (XXE) Injection and Billion Laughs (entities are never expanded)
use std::fs::{self, File};
use std::io::Write;
use std::time::Instant;
use tempfile::tempdir;
use anyhow::Result;
use zip::write::SimpleFileOptions;
#[cfg(test)]
mod tests {
    use super::*;
    use dmarc2logger::{convert_report, read_metadata, resolve_input, Config, DmarcError, Options, RecordIter};
    const MAX_PROCESSING_TIME_MS: u128 = 2000; // 2 seconds for test
    const TEST_BOMB_SIZE: usize = 2 * 1024 * 1024; // 2MB bomb for test
    fn bomb_zip(dir: &std::path::Path) -> Result<std::path::PathBuf> {
        let zip_path = dir.join("zipbomb.zip");
        let mut zip = zip::ZipWriter::new(File::create(&zip_path)?);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("large.xml", options)?;
        zip.write_all("A".repeat(TEST_BOMB_SIZE).as_bytes())?;
        zip.finish()?;
        Ok(zip_path)
    }
    /// Test protection against a ZIP bomb via the decompressed size limit.
    #[test]
    fn test_zip_bomb_size_limit() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = bomb_zip(dir.path())?;
        let config = Config { max_decompressed_size: 1024 * 1024, ..Config::default() };
        let start = Instant::now();
        let result = resolve_input(&zip_path, &config);
        assert!(start.elapsed().as_millis() < MAX_PROCESSING_TIME_MS, "ZIP bomb processing too slow");
        assert!(matches!(result, Err(DmarcError::FileTooLarge(_))), "ZIP bomb should be blocked");
        Ok(())
    }
    /// Test protection against a ZIP bomb via the compression ratio limit.
    #[test]
    fn test_zip_bomb_ratio_limit() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = bomb_zip(dir.path())?;
        let config = Config { max_compression_ratio: 10.0, ..Config::default() };
        let err = resolve_input(&zip_path, &config).unwrap_err();
        assert!(err.to_string().contains("Suspicious compression ratio"), "Unexpected error: {}", err);
        Ok(())
    }
    /// Test protection against directory traversal in ZIP file entries.
    #[test]
    fn test_directory_traversal_protection() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("traversal.zip");
        let mut zip = zip::ZipWriter::new(File::create(&zip_path)?);
        zip.start_file("../../../etc/passwd", SimpleFileOptions::default())?;
        zip.write_all(b"fake passwd file")?;
        zip.finish()?;
        let result = resolve_input(&zip_path, &Config::default());
        assert!(matches!(result, Err(DmarcError::Archive(_))), "Should block directory traversal attempt");
        Ok(())
    }
    /// A second member is rejected before any XML is parsed.
    #[test]
    fn test_multiple_members_rejected() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("two.zip");
        let mut zip = zip::ZipWriter::new(File::create(&zip_path)?);
        zip.start_file("a.xml", SimpleFileOptions::default())?;
        zip.write_all(b"<feedback/>")?;
        zip.start_file("b.xml", SimpleFileOptions::default())?;
        zip.write_all(b"not xml at all <<<")?;
        zip.finish()?;
        let mut out = Vec::new();
        let result = convert_report(&zip_path, &Options::default(), &Config::default(), &mut out);
        assert!(matches!(result, Err(DmarcError::Archive(_))));
        assert!(out.is_empty());
        Ok(())
    }
    /// Test that external entities are never resolved.
    #[test]
    fn test_xxe_protection() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("xxe.xml");
        fs::write(&path, r#"<?xml version="1.0" encoding="UTF-8"?>
        <!DOCTYPE foo [
            <!ENTITY xxe SYSTEM "file:///etc/passwd">
        ]>
        <feedback>
            <record>
                <row><source_ip>&xxe;</source_ip><count>1</count></row>
                <identifiers><header_from>example.com</header_from></identifiers>
            </record>
        </feedback>
        "#)?;
        for record in RecordIter::open(&path)? {
            let record = record?;
            assert!(!record.source_ip.contains("root:"), "XXE allowed system file read");
            assert_eq!(record.header_from, "example.com");
        }
        Ok(())
    }
    /// Test protection against the Billion Laughs attack (recursive XML entities).
    #[test]
    fn test_billion_laughs_protection() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("lolz.xml");
        fs::write(&path, r#"<?xml version="1.0"?>
        <!DOCTYPE lolz [
            <!ENTITY lol "lol">
            <!ENTITY lol2 "&lol;&lol;">
            <!ENTITY lol3 "&lol2;&lol2;">
            <!ENTITY lol4 "&lol3;&lol3;">
            <!ENTITY lol5 "&lol4;&lol4;">
            <!ENTITY lol6 "&lol5;&lol5;">
            <!ENTITY lol7 "&lol6;&lol6;">
            <!ENTITY lol8 "&lol7;&lol7;">
            <!ENTITY lol9 "&lol8;&lol8;">
        ]>
        <feedback>
            <report_metadata><org_name>&lol9;</org_name></report_metadata>
            <policy_published><domain>example.com</domain></policy_published>
        </feedback>
        "#)?;
        let start = Instant::now();
        let meta = read_metadata(&path)?.expect("metadata present");
        assert!(
            start.elapsed().as_millis() < MAX_PROCESSING_TIME_MS,
            "XML Billion Laughs was not blocked in time"
        );
        assert_eq!(meta.report.org_name, "&lol9;");
        Ok(())
    }
}
