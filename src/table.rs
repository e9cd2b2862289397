//! Encoding-tolerant ingestion and unification of raw delimited objects.

use std::borrow::Cow;
use std::collections::HashSet;

use csv::ReaderBuilder;
use tracing::debug;

use crate::errors::PipelineError;

/// Decoded object text plus a marker for which decoding produced it.
#[derive(Debug)]
pub struct DecodedText<'a> {
    /// Decoded character data.
    pub text: Cow<'a, str>,
    /// True when the bytes were not valid UTF-8 and Latin-1 was used.
    pub latin1: bool,
}

/// Decodes object bytes as UTF-8, falling back to Latin-1.
///
/// Latin-1 assigns every byte the code point of the same value, so the
/// fallback accepts any input; decoding never aborts a run on its own.
pub fn decode_text(bytes: &[u8]) -> DecodedText<'_> {
    match std::str::from_utf8(bytes) {
        Ok(text) => DecodedText {
            text: Cow::Borrowed(text),
            latin1: false,
        },
        Err(_) => DecodedText {
            text: Cow::Owned(bytes.iter().map(|&byte| byte as char).collect()),
            latin1: true,
        },
    }
}

/// Column-union table assembled from every ingested object in one run.
///
/// Cells hold raw text; numeric coercion happens on demand so a malformed
/// cell degrades to a missing value instead of failing ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Column names in first-seen order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// All rows, each aligned to the header width.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|have| have == name)
    }

    /// Appends another table, widening the header to the union of columns.
    ///
    /// Rows keep their per-object order; earlier objects' rows stay first.
    pub fn append(&mut self, other: RawTable) {
        if self.header.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }
        let mut indices = Vec::with_capacity(other.header.len());
        for column in &other.header {
            match self.column_index(column) {
                Some(index) => indices.push(index),
                None => {
                    self.header.push(column.clone());
                    indices.push(self.header.len() - 1);
                }
            }
        }
        let width = self.header.len();
        for row in &mut self.rows {
            row.resize(width, None);
        }
        for row in other.rows {
            let mut merged = vec![None; width];
            for (cell, &index) in row.into_iter().zip(indices.iter()) {
                merged[index] = cell;
            }
            self.rows.push(merged);
        }
    }

    /// Verifies the required-columns contract once after ingestion.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), PipelineError> {
        for column in required {
            if self.column_index(column).is_none() {
                return Err(PipelineError::SchemaValidation {
                    column: (*column).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Removes rows identical across every column, keeping first occurrences.
    ///
    /// Running it twice is a no-op: the first pass already left one
    /// representative per distinct row.
    pub fn dedup(&mut self) {
        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|row| seen.insert(row.clone()));
        debug!(
            kept = self.rows.len(),
            dropped = before - self.rows.len(),
            "deduplicated rows"
        );
    }

    /// Coerces a column to numbers; unparseable cells become missing values.
    pub fn numeric_column(&self, index: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(index).and_then(|cell| cell.as_deref()).and_then(parse_number))
            .collect()
    }
}

/// Parses delimited text with a header row into a table.
///
/// Short rows are padded with missing cells and long rows truncated to the
/// header width; any reader-level failure is fatal for the run.
pub fn parse_delimited(text: &str) -> Result<RawTable, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<Option<String>> =
            record.iter().map(|cell| Some(cell.to_string())).collect();
        row.resize(header.len(), None);
        rows.push(row);
    }
    Ok(RawTable { header, rows })
}

fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(text: &str) -> RawTable {
        parse_delimited(text).unwrap()
    }

    #[test]
    fn utf8_input_decodes_without_fallback() {
        let decoded = decode_text("manufacturer,price\nToyota,100\n".as_bytes());
        assert!(!decoded.latin1);
        assert!(decoded.text.contains("Toyota"));
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        // "Citroën" with Latin-1 encoded ë (0xEB), invalid as UTF-8.
        let bytes = b"manufacturer,price\nCitro\xebn,100\n";
        assert!(std::str::from_utf8(bytes).is_err());
        let decoded = decode_text(bytes);
        assert!(decoded.latin1);
        assert!(decoded.text.contains("Citroën"));
    }

    #[test]
    fn short_rows_pad_with_missing_cells() {
        let parsed = table("a,b,c\n1,2\n");
        let expected: Vec<Option<String>> = vec![Some("1".into()), Some("2".into()), None];
        assert_eq!(parsed.rows()[0], expected);
    }

    #[test]
    fn append_unions_columns_and_preserves_order() {
        let mut unified = table("manufacturer,price\nToyota,100\n");
        unified.append(table("manufacturer,mileage\nHonda,5000\n"));

        assert_eq!(unified.header(), &["manufacturer", "price", "mileage"][..]);
        let expected: Vec<Vec<Option<String>>> = vec![
            vec![Some("Toyota".into()), Some("100".into()), None],
            vec![Some("Honda".into()), None, Some("5000".into())],
        ];
        assert_eq!(unified.rows(), expected.as_slice());
    }

    #[test]
    fn append_into_empty_table_adopts_the_other() {
        let mut unified = RawTable::default();
        unified.append(table("a,b\n1,2\n"));
        assert_eq!(unified.header(), &["a", "b"][..]);
        assert_eq!(unified.len(), 1);
    }

    #[test]
    fn dedup_keeps_one_representative_and_is_idempotent() {
        let mut parsed = table("a,b\n1,2\n1,2\n3,4\n1,2\n");
        parsed.dedup();
        assert_eq!(parsed.len(), 2);

        let fixed_point = parsed.clone();
        parsed.dedup();
        assert_eq!(parsed, fixed_point);
    }

    #[test]
    fn dedup_distinguishes_missing_from_empty_cells() {
        let mut unified = table("a,b\n1,\n");
        unified.append(table("a\n1\n"));
        unified.dedup();
        assert_eq!(unified.len(), 2);
    }

    #[test]
    fn numeric_coercion_turns_bad_cells_into_missing_values() {
        let parsed = table("price\n100.5\nabc\n\n 42 \n");
        let index = parsed.column_index("price").unwrap();
        assert_eq!(
            parsed.numeric_column(index),
            vec![Some(100.5), None, None, Some(42.0)]
        );
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let parsed = table("manufacturer,price\nToyota,100\n");
        assert!(parsed.require_columns(&["manufacturer", "price"]).is_ok());
        let err = parsed.require_columns(&["mileage"]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SchemaValidation { column } if column == "mileage"
        ));
    }

    #[test]
    fn header_only_input_yields_an_empty_table() {
        let parsed = table("manufacturer,model,price,mileage\n");
        assert!(parsed.is_empty());
        assert_eq!(parsed.header().len(), 4);
    }
}
