use crate::types::Timestamp;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ─── Payload records ──────────────────────────────────────────

/// A screenshot handed to the OCR provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Screenshot {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Text extracted from a screenshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    /// Provider confidence in [0, 1].
    pub confidence: f32,
}

/// One piece of context gathered during the workflow. Tagged explicitly so
/// collaborators never exchange loosely-shaped payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextEntry {
    ExtractedText { text: String, confidence: f32 },
    UserNote { text: String },
    Environment { os: String, app_version: String },
}

/// Everything the solution provider gets to rank against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TroubleshootContext {
    pub entries: Vec<ContextEntry>,
}

impl TroubleshootContext {
    pub fn push(&mut self, entry: ContextEntry) {
        self.entries.push(entry);
    }
}

/// One candidate solution, scored by the provider. Higher score ranks first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedSolution {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub score: f32,
}

/// User feedback on a presented solution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolutionFeedback {
    pub solution_id: String,
    pub helpful: bool,
    pub comment: Option<String>,
    pub at: Timestamp,
}

// ─── Provider traits ──────────────────────────────────────────

/// Opaque text-extraction collaborator. The core never looks inside.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, screenshot: &Screenshot) -> Result<ExtractedText>;
}

/// Opaque solution-ranking collaborator.
#[async_trait]
pub trait SolutionProvider: Send + Sync {
    /// Returns candidate solutions ordered best-first.
    async fn rank_solutions(&self, context: &TroubleshootContext) -> Result<Vec<RankedSolution>>;
}
