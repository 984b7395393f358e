use crate::error::{Result, SyncError};
use crate::models::{HeaderTriple, ParsedFile, RawRow};
use crate::utils::constants::{HEADER_ROW_COUNT, TIMESTAMP_COLUMN};
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// Parser for logger exports: an optional preamble row, three header rows
/// (identifiers, units, measurement types), then data rows.
pub struct TabularParser {
    delimiter: u8,
}

impl TabularParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Read and parse a staged file
    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile> {
        let raw = std::fs::read(path)?;
        self.parse(&raw)
    }

    /// Parse raw file bytes
    pub fn parse(&self, raw: &[u8]) -> Result<ParsedFile> {
        let text = decode_bytes(raw);
        self.parse_str(&text)
    }

    pub fn parse_str(&self, text: &str) -> Result<ParsedFile> {
        let mut records = self.read_records(text)?;

        // The preamble is recognised only by lacking the TIMESTAMP identifier
        let junk_row_removed = match records.first() {
            Some(first) if !Self::is_identifier_row(first) => {
                debug!(cells = first.len(), "Discarding preamble row");
                records.remove(0);
                true
            }
            _ => false,
        };

        if records.len() < HEADER_ROW_COUNT {
            return Err(SyncError::MalformedHeader {
                found: records.len(),
            });
        }

        let mut rows = records.into_iter();
        // Length checked above
        let identifiers = rows.next().unwrap_or_default();
        let units = rows.next().unwrap_or_default();
        let measurement_types = rows.next().unwrap_or_default();

        Ok(ParsedFile {
            header: HeaderTriple::new(identifiers, units, measurement_types),
            rows: rows.map(RawRow::new).collect(),
            junk_row_removed,
        })
    }

    fn read_records(&self, text: &str) -> Result<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(records)
    }

    fn is_identifier_row(cells: &[String]) -> bool {
        cells.iter().any(|cell| cell.trim() == TIMESTAMP_COLUMN)
    }
}

impl Default for TabularParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode as UTF-8 (dropping any BOM), falling back to Windows-1252.
pub fn decode_bytes(raw: &[u8]) -> Cow<'_, str> {
    let (text, _, had_errors) = UTF_8.decode(raw);
    if !had_errors {
        return text;
    }

    debug!("File is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(raw);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const WITH_PREAMBLE: &str = "\
\"TOA5\",\"Laramie\",\"CR1000\",\"1234\",\"CR1000.Std.32\",\"CPU:hourly.CR1\",\"1111\",\"Hourly\"
\"TIMESTAMP\",\"RECORD\",\"AirTemp\",\"RH\"
\"TS\",\"RN\",\"DegC\",\"%\"
\"\",\"\",\"Avg\",\"Smp\"
\"2021-06-01 00:00:00\",5,21.4,40
\"2021-06-01 01:00:00\",6,20.9,42
";

    const WITHOUT_PREAMBLE: &str = "\
TIMESTAMP,RECORD,AirTemp
,,DegC
,,Avg
2021-06-01 00:00:00,5,21.4
";

    #[test]
    fn test_preamble_row_is_discarded() -> Result<()> {
        let parsed = TabularParser::new().parse_str(WITH_PREAMBLE)?;

        assert!(parsed.junk_row_removed);
        assert_eq!(
            parsed.header.identifiers,
            vec!["TIMESTAMP", "RECORD", "AirTemp", "RH"]
        );
        assert_eq!(parsed.header.units, vec!["TS", "RN", "DegC", "%"]);
        assert_eq!(parsed.header.measurement_types, vec!["", "", "Avg", "Smp"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].cell(2), "20.9");

        Ok(())
    }

    #[test]
    fn test_no_row_discarded_when_first_row_has_timestamp() -> Result<()> {
        let parsed = TabularParser::new().parse_str(WITHOUT_PREAMBLE)?;

        assert!(!parsed.junk_row_removed);
        assert_eq!(parsed.header.identifiers, vec!["TIMESTAMP", "RECORD", "AirTemp"]);
        assert_eq!(parsed.header.units, vec!["", "", "DegC"]);
        assert_eq!(parsed.rows, vec![RawRow::from(vec!["2021-06-01 00:00:00", "5", "21.4"])]);

        Ok(())
    }

    #[test]
    fn test_too_few_header_rows() {
        let result = TabularParser::new().parse_str("preamble,only\nTIMESTAMP,RECORD\nTS,RN\n");
        assert!(matches!(result, Err(SyncError::MalformedHeader { found: 2 })));

        let result = TabularParser::new().parse_str("");
        assert!(matches!(result, Err(SyncError::MalformedHeader { found: 0 })));
    }

    #[test]
    fn test_header_only_file_has_no_rows() -> Result<()> {
        let parsed = TabularParser::new().parse_str("TIMESTAMP,AirTemp\nTS,DegC\n,Avg\n")?;
        assert!(parsed.rows.is_empty());
        Ok(())
    }

    #[test]
    fn test_short_rows_are_kept() -> Result<()> {
        let text = "TIMESTAMP,RECORD,AirTemp\nTS,RN,DegC\n,,Avg\n2021-06-01 00:00:00,5\n";
        let parsed = TabularParser::new().parse_str(text)?;

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].len(), 2);
        assert_eq!(parsed.rows[0].cell(2), "");

        Ok(())
    }

    #[test]
    fn test_custom_delimiter() -> Result<()> {
        let text = "TIMESTAMP;AirTemp\nTS;DegC\n;Avg\n2021-06-01 00:00:00;21.4\n";
        let parsed = TabularParser::with_delimiter(b';').parse_str(text)?;
        assert_eq!(parsed.rows[0].cell(1), "21.4");
        Ok(())
    }

    #[test]
    fn test_windows_1252_fallback() -> Result<()> {
        // 0xB0 is the degree sign in Windows-1252 and invalid as a lone UTF-8 byte
        let mut raw = b"TIMESTAMP,AirTemp\nTS,".to_vec();
        raw.push(0xB0);
        raw.extend_from_slice(b"C\n,Avg\n2021-06-01 00:00:00,21.4\n");

        let parsed = TabularParser::new().parse(&raw)?;
        assert_eq!(parsed.header.units[1], "\u{b0}C");

        Ok(())
    }

    #[test]
    fn test_parse_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{}", WITH_PREAMBLE)?;

        let parsed = TabularParser::new().parse_file(temp_file.path())?;
        assert_eq!(parsed.rows.len(), 2);

        Ok(())
    }
}
