//! Pre-retrieval relevance gate
//!
//! Classifies a question before any index is touched:
//! 1. irrelevant conversational patterns (reject, high)
//! 2. toxic / prompt-injection patterns (reject, critical)
//! 3. blacklisted topic categories, in configured order (reject, high)
//! 4. business keyword stems (accept, low)
//! 5. interrogative form, optionally checked against reference questions
//! 6. otherwise reject with `no_keywords`
//!
//! Levels 1-4 are a compiled [`GateRule`] list; the first match wins.

pub mod rules;
mod semantic;

pub use rules::{BlacklistCategory, GateRule, GateRules, Matcher};
pub use semantic::SemanticMatcher;

use crate::error::Result;
use crate::retrieval::RetrievalError;
use serde::{Serialize, Serializer};
use std::fmt;

/// How serious a rejection is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Why a question was accepted or refused. Renders to a stable string code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonCode {
    IrrelevantTopic,
    ToxicPattern,
    /// Blacklisted category name
    Blacklist(String),
    BusinessKeywords,
    SemanticMatch,
    LowSemanticSimilarity,
    ValidQuestionFormat,
    NoKeywords,
    /// Reranker found nothing good enough
    LowRelevance,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonCode::IrrelevantTopic => f.write_str("irrelevant_topic"),
            ReasonCode::ToxicPattern => f.write_str("toxic_pattern"),
            ReasonCode::Blacklist(category) => write!(f, "blacklist_{}", category),
            ReasonCode::BusinessKeywords => f.write_str("business_keywords"),
            ReasonCode::SemanticMatch => f.write_str("semantic_match"),
            ReasonCode::LowSemanticSimilarity => f.write_str("low_semantic_similarity"),
            ReasonCode::ValidQuestionFormat => f.write_str("valid_question_format"),
            ReasonCode::NoKeywords => f.write_str("no_keywords"),
            ReasonCode::LowRelevance => f.write_str("low_relevance"),
        }
    }
}

impl Serialize for ReasonCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Gate verdict for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceDecision {
    pub accepted: bool,
    pub reason: ReasonCode,
    pub severity: Severity,
    /// Semantic similarity, when the semantic check ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Pattern or keyword that triggered a rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl RelevanceDecision {
    fn new(accepted: bool, reason: ReasonCode, severity: Severity) -> Self {
        Self {
            accepted,
            reason,
            severity,
            score: None,
            pattern: None,
        }
    }
}

/// Layered question classifier
pub struct RelevanceGate {
    rules: Vec<GateRule>,
    question_words: Vec<String>,
    semantic: Option<SemanticMatcher>,
}

impl RelevanceGate {
    /// Gate without the semantic check
    pub fn new(rules: &GateRules) -> Result<Self> {
        let compiled = rules.compile()?;
        tracing::debug!("Compiled {} gate rules", compiled.len());
        Ok(Self {
            rules: compiled,
            question_words: rules.normalized_question_words(),
            semantic: None,
        })
    }

    /// Attach reference-question similarity for interrogative questions
    pub fn with_semantic(mut self, matcher: SemanticMatcher) -> Self {
        self.semantic = Some(matcher);
        self
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some()
    }

    /// Classify a question.
    ///
    /// # Arguments
    /// * `question` - Raw question text
    /// * `use_semantic` - Run the reference-question check at level 5
    /// * `threshold` - Minimum similarity for a semantic match
    ///
    /// # Errors
    /// `EmbeddingService` or `Timeout` when the semantic check cannot embed
    /// the question. Such a failure never counts as acceptance.
    pub async fn evaluate(
        &self,
        question: &str,
        use_semantic: bool,
        threshold: f32,
    ) -> std::result::Result<RelevanceDecision, RetrievalError> {
        let lowered = question.trim().to_lowercase();

        if let Some(decision) = self.match_rules(&lowered) {
            return Ok(decision);
        }

        if !self.is_interrogative(&lowered) {
            return Ok(RelevanceDecision::new(
                false,
                ReasonCode::NoKeywords,
                Severity::Medium,
            ));
        }

        match (&self.semantic, use_semantic) {
            (Some(matcher), true) => {
                let score = matcher.best_similarity(question).await?;
                let decision = if score >= threshold {
                    RelevanceDecision::new(true, ReasonCode::SemanticMatch, Severity::Low)
                } else {
                    RelevanceDecision::new(
                        false,
                        ReasonCode::LowSemanticSimilarity,
                        Severity::Medium,
                    )
                };
                tracing::debug!("Semantic gate score {:.3} (threshold {:.3})", score, threshold);
                Ok(RelevanceDecision {
                    score: Some(score),
                    ..decision
                })
            }
            (None, true) => {
                tracing::debug!("Semantic check requested but no matcher attached");
                Ok(self.format_only())
            }
            (_, false) => Ok(self.format_only()),
        }
    }

    /// Classify using only the rule levels and the question-form check
    pub fn evaluate_lexical(&self, question: &str) -> RelevanceDecision {
        let lowered = question.trim().to_lowercase();
        if let Some(decision) = self.match_rules(&lowered) {
            return decision;
        }
        if self.is_interrogative(&lowered) {
            self.format_only()
        } else {
            RelevanceDecision::new(false, ReasonCode::NoKeywords, Severity::Medium)
        }
    }

    fn match_rules(&self, lowered: &str) -> Option<RelevanceDecision> {
        self.rules.iter().find_map(|rule| rule.apply(lowered))
    }

    /// Prefix match, so inflected forms like "каковы" count as "как"
    fn is_interrogative(&self, lowered: &str) -> bool {
        self.question_words
            .iter()
            .any(|word| lowered.starts_with(word.as_str()))
    }

    fn format_only(&self) -> RelevanceDecision {
        RelevanceDecision::new(true, ReasonCode::ValidQuestionFormat, Severity::Low)
    }
}
