//! Per-manufacturer aggregation and summary object serialization.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, Writer};

use crate::errors::PipelineError;
use crate::table::RawTable;

/// Column holding the group key in raw input.
pub const GROUP_COLUMN: &str = "manufacturer";

/// Input columns every run must carry: the group key, the item identifier,
/// and the two numeric measures.
pub const REQUIRED_INPUT_COLUMNS: [&str; 4] = ["manufacturer", "model", "price", "mileage"];

/// Header of the persisted summary object.
pub const SUMMARY_HEADER: [&str; 4] = ["manufacturer", "price", "mileage", "count"];

/// One aggregated row of the summary object.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    /// Group key. Rows with a missing key aggregate under the empty string.
    pub manufacturer: String,
    /// Mean price over cells that coerced, rounded to 2 decimals.
    pub avg_price: Option<f64>,
    /// Mean mileage over cells that coerced, rounded to 2 decimals.
    pub avg_mileage: Option<f64>,
    /// Contributing row count; rows with missing measures still count.
    pub count: u64,
}

#[derive(Default)]
struct GroupAccumulator {
    count: u64,
    price_sum: f64,
    price_n: u64,
    mileage_sum: f64,
    mileage_n: u64,
}

impl GroupAccumulator {
    fn mean(sum: f64, n: u64) -> Option<f64> {
        (n > 0).then(|| round2(sum / n as f64))
    }
}

/// Groups the table by manufacturer and averages the numeric measures.
///
/// Invariant: the counts across all returned rows sum to `table.len()`.
/// Output is sorted by manufacturer so serialization is deterministic.
pub fn aggregate(table: &RawTable) -> Result<Vec<GroupSummary>, PipelineError> {
    table.require_columns(&REQUIRED_INPUT_COLUMNS)?;
    let group_index = table
        .column_index(GROUP_COLUMN)
        .ok_or_else(|| PipelineError::SchemaValidation {
            column: GROUP_COLUMN.to_string(),
        })?;
    let prices = numeric_measure(table, "price")?;
    let mileages = numeric_measure(table, "mileage")?;

    let mut groups: BTreeMap<String, GroupAccumulator> = BTreeMap::new();
    for (row_index, row) in table.rows().iter().enumerate() {
        let key = row
            .get(group_index)
            .and_then(|cell| cell.clone())
            .unwrap_or_default();
        let accumulator = groups.entry(key).or_default();
        accumulator.count += 1;
        if let Some(price) = prices[row_index] {
            accumulator.price_sum += price;
            accumulator.price_n += 1;
        }
        if let Some(mileage) = mileages[row_index] {
            accumulator.mileage_sum += mileage;
            accumulator.mileage_n += 1;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(manufacturer, accumulator)| GroupSummary {
            manufacturer,
            avg_price: GroupAccumulator::mean(accumulator.price_sum, accumulator.price_n),
            avg_mileage: GroupAccumulator::mean(accumulator.mileage_sum, accumulator.mileage_n),
            count: accumulator.count,
        })
        .collect())
}

fn numeric_measure(table: &RawTable, column: &str) -> Result<Vec<Option<f64>>, PipelineError> {
    let index = table
        .column_index(column)
        .ok_or_else(|| PipelineError::SchemaValidation {
            column: column.to_string(),
        })?;
    Ok(table.numeric_column(index))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serializes summary rows as the delimited summary object payload.
///
/// Zero rows still produce a header-only payload: an input set that exists
/// but aggregates to nothing writes a degenerate, valid summary object.
pub fn write_summary(rows: &[GroupSummary]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADER)?;
    for row in rows {
        writer.write_record([
            row.manufacturer.as_str(),
            render_mean(row.avg_price).as_str(),
            render_mean(row.avg_mileage).as_str(),
            row.count.to_string().as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| PipelineError::Io(err.into_error()))
}

fn render_mean(value: Option<f64>) -> String {
    match value {
        Some(mean) => format!("{mean:.2}"),
        None => String::new(),
    }
}

/// Parses a summary object and enforces its column contract.
pub fn read_summary(text: &str) -> Result<Vec<GroupSummary>, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    let mut indices = [0usize; 4];
    for (slot, column) in indices.iter_mut().zip(SUMMARY_HEADER) {
        *slot = header
            .iter()
            .position(|have| have == column)
            .ok_or_else(|| PipelineError::SchemaValidation {
                column: column.to_string(),
            })?;
    }
    let [group_index, price_index, mileage_index, count_index] = indices;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |index: usize| record.get(index).unwrap_or("").trim();
        let count = cell(count_index).parse::<u64>().map_err(|_| {
            PipelineError::SummaryParse(format!(
                "count cell '{}' is not a whole number",
                cell(count_index)
            ))
        })?;
        rows.push(GroupSummary {
            manufacturer: cell(group_index).to_string(),
            avg_price: parse_mean(cell(price_index))?,
            avg_mileage: parse_mean(cell(mileage_index))?,
            count,
        });
    }
    Ok(rows)
}

fn parse_mean(cell: &str) -> Result<Option<f64>, PipelineError> {
    if cell.is_empty() {
        return Ok(None);
    }
    cell.parse::<f64>().map(Some).map_err(|_| {
        PipelineError::SummaryParse(format!("mean cell '{cell}' is not numeric"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_delimited;
    use pretty_assertions::assert_eq;

    fn table(text: &str) -> RawTable {
        parse_delimited(text).unwrap()
    }

    #[test]
    fn mean_of_three_prices_rounds_to_two_decimals() {
        let parsed = table(
            "manufacturer,model,price,mileage\n\
             Toyota,Corolla,10.0,30.0\n\
             Toyota,Camry,20.0,20.0\n\
             Toyota,Yaris,30.0,10.0\n",
        );
        let rows = aggregate(&parsed).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_price, Some(20.0));
        assert_eq!(rows[0].avg_mileage, Some(20.0));
        assert_eq!(rows[0].count, 3);
    }

    #[test]
    fn counts_sum_to_the_deduplicated_row_count() {
        let mut parsed = table(
            "manufacturer,model,price,mileage\n\
             Toyota,Corolla,100,1\n\
             Toyota,Corolla,100,1\n\
             Honda,Civic,200,2\n\
             Honda,Accord,bad,\n",
        );
        parsed.dedup();
        let rows = aggregate(&parsed).unwrap();
        let total: u64 = rows.iter().map(|row| row.count).sum();
        assert_eq!(total, parsed.len() as u64);
    }

    #[test]
    fn malformed_measures_are_excluded_from_means_but_not_counts() {
        let parsed = table(
            "manufacturer,model,price,mileage\n\
             Honda,Civic,200,2\n\
             Honda,Accord,bad,\n",
        );
        let rows = aggregate(&parsed).unwrap();
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].avg_price, Some(200.0));
        assert_eq!(rows[0].avg_mileage, Some(2.0));
    }

    #[test]
    fn rows_without_a_group_key_fall_under_the_empty_group() {
        let mut parsed = table(
            "manufacturer,model,price,mileage\n\
             ,Mystery,50,5\n\
             Toyota,Corolla,100,1\n",
        );
        parsed.dedup();
        let rows = aggregate(&parsed).unwrap();
        assert_eq!(rows[0].manufacturer, "");
        let total: u64 = rows.iter().map(|row| row.count).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn aggregation_requires_the_input_schema() {
        let parsed = table("manufacturer,model,price\nToyota,Corolla,100\n");
        let err = aggregate(&parsed).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SchemaValidation { column } if column == "mileage"
        ));
    }

    #[test]
    fn summary_roundtrips_including_missing_means() {
        let rows = vec![
            GroupSummary {
                manufacturer: "Honda".to_string(),
                avg_price: Some(15000.5),
                avg_mileage: None,
                count: 3,
            },
            GroupSummary {
                manufacturer: "Toyota".to_string(),
                avg_price: Some(20.0),
                avg_mileage: Some(32000.25),
                count: 7,
            },
        ];
        let bytes = write_summary(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("manufacturer,price,mileage,count\n"));
        assert!(text.contains("Honda,15000.50,,3"));

        let parsed = read_summary(&text).unwrap();
        assert_eq!(parsed[0].avg_mileage, None);
        assert_eq!(parsed[1].avg_price, Some(20.0));
        assert_eq!(parsed[1].count, 7);
    }

    #[test]
    fn zero_groups_serialize_to_a_header_only_object() {
        let bytes = write_summary(&[]).unwrap();
        assert_eq!(bytes, b"manufacturer,price,mileage,count\n");
        assert!(read_summary(std::str::from_utf8(&bytes).unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn summary_missing_a_column_is_fatal() {
        let err = read_summary("manufacturer,price,mileage\nToyota,1,2\n").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SchemaValidation { column } if column == "count"
        ));
    }

    #[test]
    fn garbage_count_cells_are_a_parse_error() {
        let err =
            read_summary("manufacturer,price,mileage,count\nToyota,1,2,lots\n").unwrap_err();
        assert!(matches!(err, PipelineError::SummaryParse(_)));
    }
}
