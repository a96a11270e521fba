use super::{AgentAdapter, prompts};
use async_trait::async_trait;
use cg_core::{AgentKind, TextGenerator};
use errors::{AgentError, ValidationError};
use gateway::Gateway;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tokio::time::Instant;

pub const SUPPORTED_LANGUAGES: [(&str, &str); 12] = [
    ("en", "English"),
    ("hi", "Hindi"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("ar", "Arabic"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("it", "Italian")
];

pub const INTEREST_AREAS: [&str; 12] = [
    "financial_obligations",
    "termination_clauses",
    "liability_limitations",
    "intellectual_property",
    "confidentiality",
    "dispute_resolution",
    "payment_terms",
    "delivery_schedules",
    "warranty_provisions",
    "force_majeure",
    "compliance_requirements",
    "renewal_options"
];

static NUMBERING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str
}

pub fn supported_languages() -> Vec<LanguageInfo> {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|&(code, name)| LanguageInfo { code, name })
        .collect()
}

/// Resolves a language code to its display name.
pub fn language_name(code: &str) -> Result<&'static str, ValidationError> {
    let code = code.trim().to_ascii_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .ok_or_else(|| ValidationError::new("language", format!("unsupported language '{}'", code)))
}

/// Keeps known interest areas, in request order, without duplicates.
pub fn filter_interests(interests: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for interest in interests {
        let interest = interest.trim().to_ascii_lowercase();
        if INTEREST_AREAS.contains(&interest.as_str()) && !kept.contains(&interest) {
            kept.push(interest);
        }
    }
    kept
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub language: String,
    #[serde(default)]
    pub interests: Vec<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedSection {
    pub title: String,
    pub content: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub language: String,
    pub language_name: String,
    pub interests: Vec<String>,
    pub summary: String,
    pub sections: Vec<TranslatedSection>
}

fn section_title(line: &str) -> Option<String> {
    let is_heading = line.starts_with('#')
        || (line.starts_with("**") && line.ends_with("**"))
        || (line.ends_with(':') && line.split_whitespace().count() <= 6);
    if !is_heading {
        return None;
    }

    let stripped = line.trim_matches(|c: char| c == '#' || c == '*' || c == ':' || c.is_whitespace());
    let title = NUMBERING.replace(stripped, "").trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// Splits generated text into titled sections on heading-like lines.
pub fn split_sections(text: &str) -> Vec<TranslatedSection> {
    let mut sections: Vec<TranslatedSection> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(title) = section_title(line) {
            if let Some((title, body)) = current.take() {
                sections.push(TranslatedSection {
                    title,
                    content: body.join("\n")
                });
            }
            current = Some((title, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        } else {
            current = Some(("Summary".to_string(), vec![line]));
        }
    }

    if let Some((title, body)) = current {
        sections.push(TranslatedSection {
            title,
            content: body.join("\n")
        });
    }

    sections.retain(|s| !s.content.is_empty());
    sections
}

pub struct TranslationAgent {
    gateway: Arc<Gateway>,
    generator: Arc<dyn TextGenerator>,
    max_text_chars: usize
}

impl TranslationAgent {
    pub fn new(gateway: Arc<Gateway>, generator: Arc<dyn TextGenerator>, max_text_chars: usize) -> Self {
        Self {
            gateway,
            generator,
            max_text_chars
        }
    }
}

#[async_trait]
impl AgentAdapter for TranslationAgent {
    type Request = TranslationRequest;
    type Output = TranslationResult;

    fn kind(&self) -> AgentKind {
        AgentKind::Translation
    }

    async fn run(
        &self,
        request: TranslationRequest,
        deadline: Instant
    ) -> Result<TranslationResult, AgentError> {
        let language_name = language_name(&request.language)?;
        if request.text.trim().is_empty() {
            return Err(ValidationError::new("text", "nothing to translate").into());
        }
        let interests = filter_interests(&request.interests);

        let text: String = request.text.chars().take(self.max_text_chars).collect();
        let prompt = prompts::translation(&text, language_name, &interests);

        let summary = self
            .gateway
            .execute(deadline, || self.generator.generate(&prompt))
            .await?;
        let summary = summary.trim().to_string();

        tracing::debug!(
            language = %request.language,
            chars = summary.chars().count(),
            "Translated summary generated"
        );

        Ok(TranslationResult {
            language: request.language.trim().to_ascii_lowercase(),
            language_name: language_name.to_string(),
            interests,
            sections: split_sections(&summary),
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_lookup() {
        assert_eq!(language_name("FR").unwrap(), "French");
        let err = language_name("xx").unwrap_err();
        assert_eq!(err.field, "language");
        assert_eq!(supported_languages().len(), 12);
    }

    #[test]
    fn test_unknown_interests_dropped() {
        let interests = vec![
            "payment_terms".to_string(),
            "astrology".to_string(),
            "Payment_Terms".to_string(),
            "force_majeure".to_string()
        ];
        assert_eq!(filter_interests(&interests), vec!["payment_terms", "force_majeure"]);
    }

    #[test]
    fn test_split_sections() {
        let text = "## 1. Contract Overview\nSupply of widgets.\n\nKey Terms and Obligations:\nPay in 15 days.\nDeliver in 30 days.\n**Recommendations**\nNegotiate the indemnity.";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "Contract Overview");
        assert_eq!(sections[1].title, "Key Terms and Obligations");
        assert_eq!(sections[1].content, "Pay in 15 days.\nDeliver in 30 days.");
        assert_eq!(sections[2].title, "Recommendations");
    }

    #[test]
    fn test_unstructured_text_is_one_section() {
        let sections = split_sections("Le contrat est équilibré.\nAucun risque majeur.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Summary");
        assert_eq!(sections[0].content, "Le contrat est équilibré.\nAucun risque majeur.");
    }
}
