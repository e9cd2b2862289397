//! Report text construction: model mode with a deterministic template fallback.

use tracing::warn;

use crate::errors::PipelineError;
use crate::summarizer::{LlmSummarizer, ModelConfig};
use crate::summary::GroupSummary;

/// Note appended to template-mode report bodies.
pub const FALLBACK_NOTE: &str =
    " (AI summarization was unavailable; template summary shown.)";

/// Instruction wrapped around the context sentence in model mode.
const PROMPT_PREFIX: &str =
    "Summarize the following manufacturer summary into 1-2 sentences for a business report: ";

/// Generation strategy resolved once per run and threaded explicitly.
pub enum GenerationMode {
    /// Report bodies come from the generative model.
    Model(LlmSummarizer),
    /// Report bodies reuse the context sentence with an unavailability note.
    Template,
}

impl GenerationMode {
    /// Resolves the mode for the whole run from one probe of the runtime.
    ///
    /// Probe failure is logged and downgrades to template mode; it never
    /// aborts the run. The returned mode stays fixed for every row.
    pub fn resolve(config: &ModelConfig) -> Self {
        match LlmSummarizer::probe(config) {
            Ok(client) => GenerationMode::Model(client),
            Err(err) => {
                warn!("model runtime unavailable, using template fallback: {err}");
                GenerationMode::Template
            }
        }
    }

    /// True when report bodies come from the generative model.
    pub fn is_model(&self) -> bool {
        matches!(self, GenerationMode::Model(_))
    }
}

/// Builds the fixed-pattern context sentence for one summary row.
///
/// This string is always computed: it is the template-mode body and the
/// prompt basis for model mode. Missing means render as `n/a`.
pub fn report_context(row: &GroupSummary) -> String {
    format!(
        "Manufacturer: {}. Average price: ${}. Average mileage: {} miles. Count of records: {}.",
        row.manufacturer,
        render_measure(row.avg_price),
        render_measure(row.avg_mileage),
        row.count
    )
}

/// Produces the report body for one row under the resolved mode.
///
/// A model that returns an empty body falls back to the context sentence so
/// no report object is ever written empty.
pub fn render_report(
    mode: &GenerationMode,
    row: &GroupSummary,
) -> Result<String, PipelineError> {
    let context = report_context(row);
    match mode {
        GenerationMode::Template => Ok(format!("{context}{FALLBACK_NOTE}")),
        GenerationMode::Model(client) => {
            let prompt = format!("{PROMPT_PREFIX}{context}");
            let text = client.summarize(&prompt)?;
            if text.is_empty() {
                Ok(context)
            } else {
                Ok(text)
            }
        }
    }
}

fn render_measure(value: Option<f64>) -> String {
    match value {
        Some(measure) => format!("{measure:.2}"),
        None => "n/a".to_string(),
    }
}
