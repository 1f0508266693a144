//! Candidate count chosen from the shape of the question

/// Candidates for short factual questions
pub const FACTUAL_CANDIDATES: usize = 5;

/// Candidates when no marker matches
pub const DEFAULT_CANDIDATES: usize = 10;

/// Candidates for questions asking for an explanation
pub const EXPLANATORY_CANDIDATES: usize = 15;

const FACTUAL_MARKERS: &[&str] = &["когда", "где", "сколько", "кто", "дата"];
const EXPLANATORY_MARKERS: &[&str] = &["почему", "как работает", "объясни", "опиши"];

/// Number of fused candidates to keep for `question`.
///
/// Markers are matched as substrings of the lower-cased question; factual
/// markers are checked first.
pub fn adaptive_candidate_count(question: &str) -> usize {
    let lowered = question.to_lowercase();

    if FACTUAL_MARKERS.iter().any(|m| lowered.contains(m)) {
        FACTUAL_CANDIDATES
    } else if EXPLANATORY_MARKERS.iter().any(|m| lowered.contains(m)) {
        EXPLANATORY_CANDIDATES
    } else {
        DEFAULT_CANDIDATES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factual() {
        assert_eq!(adaptive_candidate_count("Когда основана Транснефть?"), 5);
        assert_eq!(adaptive_candidate_count("Сколько сотрудников в компании?"), 5);
    }

    #[test]
    fn test_explanatory() {
        assert_eq!(adaptive_candidate_count("Почему растут тарифы?"), 15);
        assert_eq!(adaptive_candidate_count("Опиши систему ВСТО"), 15);
    }

    #[test]
    fn test_factual_wins_over_explanatory() {
        assert_eq!(adaptive_candidate_count("Почему и когда построили нефтепровод?"), 5);
    }

    #[test]
    fn test_default() {
        assert_eq!(adaptive_candidate_count("Структура корпоративного управления"), 10);
    }
}
