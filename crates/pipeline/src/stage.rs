//! The fixed, ordered set of pipeline stages.

use serde::{Deserialize, Serialize};

/// One step of the five-step document pipeline.
///
/// `Stage::ALL` is the canonical execution order; stage N+1 never runs
/// before stage N completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingestion,
    Research,
    Citation,
    Formatting,
    Compliance,
}

impl Stage {
    /// The pipeline in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Ingestion,
        Stage::Research,
        Stage::Citation,
        Stage::Formatting,
        Stage::Compliance,
    ];

    /// Wire name (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "ingestion",
            Stage::Research => "research",
            Stage::Citation => "citation",
            Stage::Formatting => "formatting",
            Stage::Compliance => "compliance",
        }
    }

    /// Model identifier used for this stage on the inference endpoint.
    pub fn model(&self) -> &'static str {
        match self {
            Stage::Ingestion => "meta-llama/Llama-3.2-1B-Instruct",
            Stage::Research => "microsoft/Phi-3-mini-4k-instruct",
            Stage::Citation => "google/flan-t5-large",
            Stage::Formatting => "facebook/bart-large-cnn",
            Stage::Compliance => "meta-llama/Llama-3.2-1B-Instruct",
        }
    }

    /// Assemble the stage prompt from its fixed template and the upstream text.
    pub fn prompt(&self, text: &str) -> String {
        match self {
            Stage::Ingestion => format!("Extract clean structured content:\n\n{text}"),
            Stage::Research => format!("Research this topic:\n{text}"),
            Stage::Citation => format!("Add citation markers:\n{text}"),
            Stage::Formatting => format!("Format professionally:\n{text}"),
            Stage::Compliance => format!("Neutralize and ensure safety compliance:\n{text}"),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
