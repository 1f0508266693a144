//! User-facing refusal texts

use crate::gate::{ReasonCode, RelevanceDecision, Severity};
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the semantic score in percent
const SCORE_PLACEHOLDER: &str = "{score}";

/// Why the pipeline refused to answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefusalReason {
    /// The relevance gate rejected the question
    Rejected(RelevanceDecision),
    /// Retrieval ran but the best reranked passage was too weak
    LowRelevance { best_score: f32 },
}

impl RefusalReason {
    pub fn code(&self) -> ReasonCode {
        match self {
            RefusalReason::Rejected(decision) => decision.reason.clone(),
            RefusalReason::LowRelevance { .. } => ReasonCode::LowRelevance,
        }
    }
}

/// A polite non-answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refusal {
    pub reason: RefusalReason,
    pub message: String,
}

/// Configurable refusal texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefusalMessages {
    /// Toxic or otherwise unprocessable questions
    pub cannot_process: String,
    /// Questions on a blacklisted topic
    pub not_related: String,
    /// Weak semantic similarity; may contain `{score}`
    pub weak_relation: String,
    /// Nothing relevant found
    pub not_found: String,
}

impl Default for RefusalMessages {
    fn default() -> Self {
        Self {
            cannot_process: "Прошу прощения, я не могу обработать ваш запрос. \
                Пожалуйста, задайте вопрос о ПАО «Транснефть»."
                .to_string(),
            not_related: "Прошу прощения, я не знаю ответ на ваш вопрос. \
                Возможно, он не связан с ПАО «Транснефть». \
                Я специализируюсь на вопросах о нефтетранспортной компании."
                .to_string(),
            weak_relation: "Прошу прощения, ваш вопрос недостаточно связан с ПАО «Транснефть» \
                (релевантность: {score}%). Попробуйте переформулировать вопрос более конкретно."
                .to_string(),
            not_found: "Прошу прощения, я не нашёл информации по вашему вопросу. \
                Задайте вопрос о ПАО «Транснефть» ещё раз."
                .to_string(),
        }
    }
}

impl RefusalMessages {
    /// Text for a refusal reason. Reason-specific texts take precedence over
    /// the severity fallback.
    pub fn render(&self, reason: &RefusalReason) -> String {
        match reason {
            RefusalReason::LowRelevance { .. } => self.not_found.clone(),
            RefusalReason::Rejected(decision) => self.render_decision(decision),
        }
    }

    fn render_decision(&self, decision: &RelevanceDecision) -> String {
        match &decision.reason {
            ReasonCode::ToxicPattern => self.cannot_process.clone(),
            ReasonCode::Blacklist(_) => self.not_related.clone(),
            ReasonCode::LowSemanticSimilarity | ReasonCode::SemanticMatch => {
                let percent = decision.score.unwrap_or(0.0) * 100.0;
                self.weak_relation
                    .replace(SCORE_PLACEHOLDER, &format!("{:.0}", percent))
            }
            _ if decision.severity >= Severity::High => self.cannot_process.clone(),
            _ => self.not_found.clone(),
        }
    }

    /// Build a refusal with its rendered text
    pub fn refuse(&self, reason: RefusalReason) -> Refusal {
        let message = self.render(&reason);
        Refusal { reason, message }
    }
}
