#![warn(missing_docs)]
//! Core library entry points for the autobrief batch pipeline.

pub mod errors;
pub mod naming;
pub mod report;
pub mod stages;
pub mod store;
pub mod summarizer;
pub mod summary;
pub mod table;

pub use errors::PipelineError;
pub use naming::{
    has_csv_suffix, latest_csv_key, report_object_key, run_timestamp, sanitize_key,
    summary_object_key, CSV_SUFFIX,
};
pub use report::{render_report, report_context, GenerationMode, FALLBACK_NOTE};
pub use stages::{run_report, run_transform, ReportOutcome, TransformOutcome};
pub use store::{FsObjectStore, ObjectInfo, ObjectStore};
pub use summarizer::{LlmSummarizer, ModelConfig};
pub use summary::{
    aggregate, read_summary, write_summary, GroupSummary, GROUP_COLUMN, REQUIRED_INPUT_COLUMNS,
    SUMMARY_HEADER,
};
pub use table::{decode_text, parse_delimited, DecodedText, RawTable};
