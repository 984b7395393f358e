use serde::{Deserialize, Serialize};

/// The three aligned header rows that describe a file's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderTriple {
    pub identifiers: Vec<String>,
    pub units: Vec<String>,
    pub measurement_types: Vec<String>,
}

impl HeaderTriple {
    pub fn new(identifiers: Vec<String>, units: Vec<String>, measurement_types: Vec<String>) -> Self {
        Self {
            identifiers,
            units,
            measurement_types,
        }
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Position of the first column whose identifier matches exactly.
    pub fn position(&self, identifier: &str) -> Option<usize> {
        self.identifiers.iter().position(|id| id == identifier)
    }

    pub fn unit(&self, index: usize) -> &str {
        self.units.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn measurement_type(&self, index: usize) -> &str {
        self.measurement_types
            .get(index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One data row, positionally aligned to the header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRow {
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// A cell beyond the end of a short row reads as empty.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Value under the named column, if the column exists and the cell is non-empty.
    pub fn value_for<'a>(&'a self, header: &HeaderTriple, identifier: &str) -> Option<&'a str> {
        header
            .position(identifier)
            .map(|index| self.cell(index))
            .filter(|value| !value.is_empty())
    }
}

impl From<Vec<&str>> for RawRow {
    fn from(cells: Vec<&str>) -> Self {
        Self::new(cells.into_iter().map(str::to_string).collect())
    }
}

/// Output of the tabular parser: header description plus data rows in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub header: HeaderTriple,
    pub rows: Vec<RawRow>,
    pub junk_row_removed: bool,
}
