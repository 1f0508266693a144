//! Sentence-level context compression for the answer generator

use super::provenance::ScoredPassage;
use ahash::AHashSet;
use serde::Serialize;

/// A passage text prepared for the generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressedContext {
    pub passage_id: String,
    pub text: String,
    /// True when sentences were dropped
    pub compressed: bool,
}

/// Keep only the sentences that share a word with the question.
///
/// Sentences are the '.'-separated pieces of the passage; words are
/// lower-cased whitespace tokens. A passage without any matching sentence is
/// passed through whole.
pub fn compress_contexts(question: &str, passages: &[ScoredPassage]) -> Vec<CompressedContext> {
    let question_words: AHashSet<String> = question
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    passages
        .iter()
        .map(|candidate| {
            let relevant: Vec<&str> = candidate
                .text()
                .split('.')
                .filter(|sentence| {
                    sentence
                        .to_lowercase()
                        .split_whitespace()
                        .any(|word| question_words.contains(word))
                })
                .collect();

            if relevant.is_empty() {
                CompressedContext {
                    passage_id: candidate.id().to_string(),
                    text: candidate.text().to_string(),
                    compressed: false,
                }
            } else {
                CompressedContext {
                    passage_id: candidate.id().to_string(),
                    text: relevant.join(". "),
                    compressed: true,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{Passage, SourceMetadata};
    use std::sync::Arc;

    fn scored(text: &str) -> ScoredPassage {
        ScoredPassage::dense(Arc::new(Passage::new(text, SourceMetadata::default())), 0.5)
    }

    #[test]
    fn test_keeps_matching_sentences() {
        let passages = vec![scored(
            "Компания основана в 1993 году. Выручка выросла на 5%. Штаб-квартира в Москве",
        )];
        let contexts = compress_contexts("какая выручка компании", &passages);

        assert_eq!(contexts.len(), 1);
        assert!(contexts[0].compressed);
        assert_eq!(contexts[0].text, " Выручка выросла на 5%");
    }

    #[test]
    fn test_passage_without_match_is_whole() {
        let text = "Нефтепровод введён в эксплуатацию. Протяжённость 4740 км";
        let contexts = compress_contexts("кто акционеры", &[scored(text)]);

        assert!(!contexts[0].compressed);
        assert_eq!(contexts[0].text, text);
    }
}
