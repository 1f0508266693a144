//! JSONL passage corpus produced by the ingestion side
//!
//! One JSON object per line:
//! `{"id": "...", "text": "...", "document_id": "...", "section_title": "...", "chunk_index": 0}`.
//! Only `text` is required; a missing `id` is derived from the text.

use crate::error::{RagrankError, Result};
use crate::retrieval::{Passage, SourceMetadata};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CorpusRecord {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    document_id: String,
    #[serde(default)]
    section_title: String,
    #[serde(default)]
    chunk_index: u64,
    #[serde(default)]
    token_count: Option<usize>,
}

impl CorpusRecord {
    fn into_passage(self) -> Passage {
        let source = SourceMetadata {
            document_id: self.document_id,
            section_title: self.section_title,
            chunk_index: self.chunk_index,
        };
        let mut passage = Passage::new(self.text, source);
        if let Some(id) = self.id.filter(|id| !id.trim().is_empty()) {
            passage.id = id;
        }
        if let Some(count) = self.token_count {
            passage.token_count = count;
        }
        passage
    }
}

/// Parse passages from JSONL text. Blank lines are ignored.
pub fn parse_passages(content: &str) -> Result<Vec<Passage>> {
    let mut passages = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: CorpusRecord =
            serde_json::from_str(line).map_err(|e| RagrankError::Corpus {
                line: line_no + 1,
                message: e.to_string(),
            })?;

        if record.text.trim().is_empty() {
            return Err(RagrankError::Corpus {
                line: line_no + 1,
                message: "passage text is empty".to_string(),
            });
        }

        passages.push(record.into_passage());
    }

    Ok(passages)
}

/// Load passages from a JSONL file
pub fn load_passages(path: &Path) -> Result<Vec<Passage>> {
    let content = std::fs::read_to_string(path).map_err(|e| RagrankError::Io {
        source: e,
        context: format!("Failed to read corpus file: {}", path.display()),
    })?;

    let passages = parse_passages(&content)?;
    tracing::info!(
        "Loaded {} passages from {}",
        passages.len(),
        path.display()
    );
    Ok(passages)
}
