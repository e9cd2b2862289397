//! Runnable pipeline stages wired by the CLI binaries.
//!
//! Each stage is one strictly sequential pass: discovery, processing,
//! persistence. Scheduling, retries, and overlap prevention live in the
//! external orchestrator; nothing here locks, polls, or checkpoints.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::PipelineError;
use crate::naming::{
    has_csv_suffix, latest_csv_key, report_object_key, run_timestamp, summary_object_key,
};
use crate::report::{render_report, GenerationMode};
use crate::store::ObjectStore;
use crate::summary::{aggregate, read_summary, write_summary, REQUIRED_INPUT_COLUMNS};
use crate::table::{decode_text, parse_delimited, RawTable};

/// Result of one transform run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Nothing eligible under the input prefix; nothing was written.
    NoInput,
    /// A summary object was written.
    Written {
        /// Key of the new summary object.
        key: String,
        /// Deduplicated row count that fed aggregation.
        rows: usize,
        /// Number of group summary rows persisted.
        groups: usize,
    },
}

/// Result of one report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// No summary object under the input prefix; nothing was written.
    NoSummary,
    /// Reports were generated from the latest summary object.
    Generated {
        /// Summary object the stage read.
        source: String,
        /// Keys of successfully written report objects.
        written: Vec<String>,
        /// Rows whose generation failed and was skipped.
        failed: usize,
    },
}

/// Consolidates raw input objects into one timestamped summary object.
///
/// Absence of eligible input is a successful no-op that writes nothing;
/// eligible input that aggregates to zero rows still writes a header-only
/// summary. Storage and schema failures abort before anything is written.
pub fn run_transform<S: ObjectStore>(
    store: &S,
    input_prefix: &str,
    output_prefix: &str,
    now: DateTime<Utc>,
) -> Result<TransformOutcome, PipelineError> {
    let input_prefix = input_prefix.trim_end_matches('/');
    let output_prefix = output_prefix.trim_end_matches('/');

    let objects = store.list(input_prefix)?;
    if objects.is_empty() {
        println!("No objects found under prefix: {input_prefix}/");
        return Ok(TransformOutcome::NoInput);
    }
    let inputs: Vec<_> = objects
        .iter()
        .filter(|object| has_csv_suffix(&object.key))
        .collect();
    if inputs.is_empty() {
        let present: Vec<&str> = objects.iter().map(|object| object.key.as_str()).collect();
        println!("No CSV objects found under prefix {input_prefix}/. Keys present: {present:?}");
        return Ok(TransformOutcome::NoInput);
    }

    let mut unified = RawTable::default();
    for object in &inputs {
        println!("Reading {}", object.key);
        let bytes = store.get(&object.key)?;
        let decoded = decode_text(&bytes);
        if decoded.latin1 {
            debug!(key = %object.key, "decoded with Latin-1 fallback");
        }
        unified.append(parse_delimited(&decoded.text)?);
    }

    unified.require_columns(&REQUIRED_INPUT_COLUMNS)?;
    unified.dedup();
    let summaries = aggregate(&unified)?;
    let payload = write_summary(&summaries)?;

    let key = summary_object_key(output_prefix, &run_timestamp(now));
    println!("Writing {key}");
    store.put(&key, &payload)?;
    Ok(TransformOutcome::Written {
        key,
        rows: unified.len(),
        groups: summaries.len(),
    })
}

/// Renders one report object per group row of the latest summary object.
///
/// The generation mode is resolved once by the caller and fixed for the run.
/// A row whose generation fails is logged and skipped; rows that succeed
/// keep their objects. Storage failures abort immediately.
pub fn run_report<S: ObjectStore>(
    store: &S,
    mode: &GenerationMode,
    input_prefix: &str,
    output_prefix: &str,
    now: DateTime<Utc>,
) -> Result<ReportOutcome, PipelineError> {
    let input_prefix = input_prefix.trim_end_matches('/');
    let output_prefix = output_prefix.trim_end_matches('/');

    let objects = store.list(input_prefix)?;
    let Some(source) = latest_csv_key(&objects) else {
        println!("No summary objects found under prefix: {input_prefix}/");
        return Ok(ReportOutcome::NoSummary);
    };
    println!("Using processed file: {source}");

    let bytes = store.get(&source)?;
    let text = String::from_utf8(bytes).map_err(|_| {
        PipelineError::SummaryParse("summary object is not valid UTF-8".to_string())
    })?;
    let summaries = read_summary(&text)?;

    let timestamp = run_timestamp(now);
    let mut written = Vec::with_capacity(summaries.len());
    let mut failed = 0usize;
    for row in &summaries {
        let body = match render_report(mode, row) {
            Ok(body) => body,
            Err(err) => {
                failed += 1;
                eprintln!("report generation failed for '{}': {err}", row.manufacturer);
                continue;
            }
        };
        let key = report_object_key(output_prefix, &row.manufacturer, &timestamp);
        println!("Writing report to {key}");
        store.put(&key, body.as_bytes())?;
        written.push(key);
    }
    Ok(ReportOutcome::Generated {
        source,
        written,
        failed,
    })
}
