//! Error taxonomy shared by the transform and report stages.

use std::io;

use thiserror::Error;

/// Error type covering the fatal failure classes of both pipeline stages.
///
/// Numeric coercion failures are not represented here: a cell that fails to
/// parse becomes a missing value instead of an error. Model-probe failures
/// downgrade the run to template mode and are only surfaced as
/// `ModelUnavailable` by the probe itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An object-store list, get, or put failed. Always fatal for the run.
    #[error("storage operation failed for '{key}': {source}")]
    Storage {
        /// Object key or prefix the operation targeted.
        key: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A required column was absent after ingestion or summary load.
    #[error("required column '{column}' is missing")]
    SchemaValidation {
        /// Name of the missing column.
        column: String,
    },
    /// The selected summary object could not be interpreted.
    #[error("summary object is malformed: {0}")]
    SummaryParse(String),
    /// The generative-model runtime could not be resolved at startup.
    #[error("model runtime unavailable: {0}")]
    ModelUnavailable(String),
    /// A generation request failed after the runtime probed healthy.
    #[error("model generation failed: {0}")]
    Model(String),
    /// Delimited parsing failed; fatal for the run.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Filesystem failure outside the object-store boundary.
    #[error(transparent)]
    Io(#[from] io::Error),
}
