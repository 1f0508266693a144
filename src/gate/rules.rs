//! Gate rule definitions loaded from TOML and compiled once
//!
//! Rule file layout:
//! ```toml
//! irrelevant_patterns = ['\bкак дела\b']
//! toxic_patterns = ['забудь']
//! business_keywords = ['нефтепровод']
//! question_words = ['что', 'как']
//! reference_queries = ['Чем занимается ПАО Транснефть?']
//!
//! [[blacklist]]
//! name = "погода"
//! keywords = ["погода", "дождь"]
//! ```
//! Blacklist categories are checked in file order.

use super::{ReasonCode, RelevanceDecision, Severity};
use crate::error::{RagrankError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Off-topic category with its trigger keywords
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Raw gate rules as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRules {
    /// Conversational / opinion patterns (regex)
    #[serde(default)]
    pub irrelevant_patterns: Vec<String>,

    /// Attack and prompt-injection patterns (regex)
    #[serde(default)]
    pub toxic_patterns: Vec<String>,

    /// Ordered off-topic categories
    #[serde(default)]
    pub blacklist: Vec<BlacklistCategory>,

    /// Domain word stems, matched as substrings
    #[serde(default)]
    pub business_keywords: Vec<String>,

    /// Interrogative words that trigger the semantic check
    #[serde(default)]
    pub question_words: Vec<String>,

    /// In-domain questions the semantic check compares against
    #[serde(default)]
    pub reference_queries: Vec<String>,
}

impl Default for GateRules {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let category = |name: &str, keywords: &[&str]| BlacklistCategory {
            name: name.to_string(),
            keywords: strings(keywords),
        };

        Self {
            irrelevant_patterns: strings(&[
                r"\b(европа|америка|азия)\s+(лучше|хуже)",
                r"\b(лучше|хуже)\s+чем\b",
                r"\bкак дела\b",
                r"\b(привет|здравствуй)\b",
                r"\bчто нового\b",
            ]),
            toxic_patterns: strings(&[
                r"игнор[иу]й",
                r"забудь",
                r"ты (тупой|глупый|идиот)",
                r"как (взломать|хакнуть)",
                r"secret[_\s]?key",
                r"пароль",
            ]),
            blacklist: vec![
                category(
                    "погода",
                    &["погода", "температура", "дождь", "снег", "солнечно", "облачно"],
                ),
                category(
                    "кулинария",
                    &["рецепт", "готовить", "приготовить", "кулинар", "варить", "жарить"],
                ),
                category(
                    "кино",
                    &["фильм", "кино", "сериал", "актер", "актриса", "режиссер"],
                ),
                category(
                    "спорт",
                    &["футбол", "хоккей", "баскетбол", "спорт", "матч", "чемпионат"],
                ),
                category(
                    "технологии",
                    &["iphone", "android", "смартфон", "телефон", "компьютер", "ноутбук"],
                ),
                category(
                    "транспорт_личный",
                    &["автомобиль", "машина", "авто", "bmw", "mercedes", "toyota"],
                ),
                category(
                    "развлечения",
                    &["игра", "играть", "геймер", "консоль", "playstation", "xbox"],
                ),
                category(
                    "здоровье",
                    &["болезнь", "лекарство", "врач", "больница", "лечить"],
                ),
                category(
                    "политика",
                    &["президент", "правительство", "министр", "выборы", "парламент"],
                ),
            ],
            business_keywords: strings(&[
                "корпоративн",
                "управлени",
                "структур",
                "совет",
                "директор",
                "акционер",
                "выручк",
                "прибыл",
                "доход",
                "финанс",
                "отчёт",
                "деятельност",
                "бизнес",
                "компани",
                "предприяти",
                "транснефт",
                "нефтепровод",
                "нефт",
                "персонал",
                "сотрудник",
                "инвестици",
                "трубопровод",
                "магистраль",
                "перекачк",
                "транспорт",
            ]),
            question_words: strings(&[
                "что", "как", "где", "когда", "почему", "сколько", "какой", "какая", "какие",
                "кто", "чем", "зачем",
            ]),
            reference_queries: strings(&[
                "Чем занимается ПАО Транснефть?",
                "Какая длина нефтепроводов Транснефти?",
                "Где находятся объекты Транснефти?",
                "Какая выручка компании Транснефть?",
                "История создания Транснефти",
                "Структура корпоративного управления в Транснефти",
                "Сколько сотрудников работает в компании?",
                "Какие инвестиционные проекты реализует Транснефть?",
                "Финансовые показатели компании за последний год",
                "Кто является акционерами ПАО Транснефть?",
                "Основные направления деятельности Транснефти",
                "Какая протяженность магистральных нефтепроводов?",
            ]),
        }
    }
}

impl GateRules {
    /// Load rules from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagrankError::Io {
            source: e,
            context: format!("Failed to read gate rules: {:?}", path),
        })?;
        let rules: GateRules = toml::from_str(&content)?;
        tracing::info!(
            "Loaded gate rules from {:?}: {} blacklist categories",
            path,
            rules.blacklist.len()
        );
        Ok(rules)
    }

    /// Load rules from `path` if given, built-in defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Compile into the ordered rule list for levels 1-4.
    ///
    /// Keywords are lower-cased here; questions are lower-cased before
    /// matching.
    pub fn compile(&self) -> Result<Vec<GateRule>> {
        let mut rules = Vec::new();

        for pattern in &self.irrelevant_patterns {
            rules.push(GateRule {
                matcher: Matcher::Pattern(compile_pattern("irrelevant_patterns", pattern)?),
                accepted: false,
                reason: ReasonCode::IrrelevantTopic,
                severity: Severity::High,
            });
        }

        for pattern in &self.toxic_patterns {
            rules.push(GateRule {
                matcher: Matcher::Pattern(compile_pattern("toxic_patterns", pattern)?),
                accepted: false,
                reason: ReasonCode::ToxicPattern,
                severity: Severity::Critical,
            });
        }

        for category in &self.blacklist {
            rules.push(GateRule {
                matcher: Matcher::Substrings(lowercase_all(&category.keywords)),
                accepted: false,
                reason: ReasonCode::Blacklist(category.name.clone()),
                severity: Severity::High,
            });
        }

        if !self.business_keywords.is_empty() {
            rules.push(GateRule {
                matcher: Matcher::Substrings(lowercase_all(&self.business_keywords)),
                accepted: true,
                reason: ReasonCode::BusinessKeywords,
                severity: Severity::Low,
            });
        }

        Ok(rules)
    }

    /// Lower-cased question words
    pub fn normalized_question_words(&self) -> Vec<String> {
        lowercase_all(&self.question_words)
    }
}

fn compile_pattern(section: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RagrankError::InvalidConfigValue {
        path: format!("gate.{}", section),
        message: format!("invalid pattern '{}': {}", pattern, e),
    })
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// How a rule inspects the lower-cased question
#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(Regex),
    Substrings(Vec<String>),
}

impl Matcher {
    /// The pattern or keyword that matched, if any
    pub fn find(&self, lowered: &str) -> Option<String> {
        match self {
            Matcher::Pattern(regex) => regex.is_match(lowered).then(|| regex.as_str().to_string()),
            Matcher::Substrings(keywords) => keywords
                .iter()
                .find(|kw| lowered.contains(kw.as_str()))
                .cloned(),
        }
    }
}

/// One predicate with the decision it yields when it matches
#[derive(Debug, Clone)]
pub struct GateRule {
    pub matcher: Matcher,
    pub accepted: bool,
    pub reason: ReasonCode,
    pub severity: Severity,
}

impl GateRule {
    /// Decision for a lower-cased question, `None` if the rule does not match
    pub fn apply(&self, lowered: &str) -> Option<RelevanceDecision> {
        self.matcher.find(lowered).map(|matched| RelevanceDecision {
            accepted: self.accepted,
            reason: self.reason.clone(),
            severity: self.severity,
            score: None,
            pattern: Some(matched),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_compile_in_order() {
        let rules = GateRules::default().compile().unwrap();

        // 5 irrelevant + 6 toxic + 9 categories + 1 whitelist
        assert_eq!(rules.len(), 21);
        assert_eq!(rules[0].reason, ReasonCode::IrrelevantTopic);
        assert_eq!(rules[5].reason, ReasonCode::ToxicPattern);
        assert_eq!(rules[11].reason, ReasonCode::Blacklist("погода".to_string()));
        assert_eq!(rules[20].reason, ReasonCode::BusinessKeywords);
        assert!(rules[20].accepted);
    }

    #[test]
    fn test_invalid_pattern_reports_section() {
        let rules = GateRules {
            toxic_patterns: vec!["(unclosed".to_string()],
            ..GateRules::default()
        };
        match rules.compile() {
            Err(RagrankError::InvalidConfigValue { path, .. }) => {
                assert_eq!(path, "gate.toxic_patterns")
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_round_trip_through_toml_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("gate_rules.toml");
        let rules = GateRules::default();
        std::fs::write(&path, toml::to_string(&rules).unwrap()).unwrap();

        let loaded = GateRules::load(&path).unwrap();
        assert_eq!(loaded, rules);
        assert_eq!(loaded.blacklist[0].name, "погода");
        assert_eq!(loaded.blacklist[8].name, "политика");
    }

    #[test]
    fn test_keywords_are_lowercased() {
        let rules = GateRules {
            blacklist: vec![BlacklistCategory {
                name: "технологии".to_string(),
                keywords: vec!["iPhone".to_string()],
            }],
            ..GateRules::default()
        };
        let compiled = rules.compile().unwrap();
        let rule = compiled
            .iter()
            .find(|r| r.reason == ReasonCode::Blacklist("технологии".to_string()))
            .unwrap();
        assert!(rule.apply("какой iphone купить").is_some());
    }
}
