//! Prompt construction for every agent.
//!
//! Risk-analysis prompts label each clause `CLAUSE_<n>` with its 1-based
//! position in the document; the response parser relies on those labels.

use super::risk::ClauseReport;
use cg_core::{ConversationTurn, RiskLevel, TurnRole};
use gateway::WorkBatch;

/// Shortens `text` to at most `max_chars` characters.
///
/// Keeps the first and last sentence when they fit, otherwise truncates.
pub fn compress_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let sentences: Vec<&str> = text
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if let (Some(first), Some(last)) = (sentences.first(), sentences.last()) {
        if sentences.len() >= 2 {
            let candidate = format!("{}. ... {}", first.trim_end_matches('.'), last);
            if candidate.chars().count() <= max_chars {
                return candidate;
            }
        }
    }

    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", head)
}

pub fn risk_batch(batch: &WorkBatch<String>, max_clause_chars: usize) -> String {
    let mut clauses = String::new();
    for (i, clause) in batch.items.iter().enumerate() {
        clauses.push_str(&format!(
            "CLAUSE_{}: {}\n\n",
            batch.offset + i + 1,
            compress_text(clause, max_clause_chars)
        ));
    }

    format!(
        "You are a legal risk analyst. Assess each contract clause below.\n\
         For every clause answer with its label followed by a JSON object, exactly:\n\
         CLAUSE_<n>_ANALYSIS: {{\"risk_level\": \"High|Medium|Low\", \"analysis\": \"one or two sentences\"}}\n\
         Answer every clause, in order, and nothing else.\n\n{}",
        clauses
    )
}

pub fn summary(clauses: &[ClauseReport]) -> String {
    let mut sections = String::new();
    for level in [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
        let matching: Vec<String> = clauses
            .iter()
            .filter_map(|c| {
                let assessment = c.result.completed()?;
                (assessment.risk_level == level).then(|| {
                    format!(
                        "- Clause {} ({} risk): {}\n  Text: {}\n",
                        c.index,
                        level,
                        assessment.explanation,
                        compress_text(&c.text, 200)
                    )
                })
            })
            .collect();
        if !matching.is_empty() {
            sections.push_str(&format!(
                "\n{} RISK CLAUSES ({}):\n{}",
                level.as_ref().to_uppercase(),
                matching.len(),
                matching.concat()
            ));
        }
    }

    format!(
        "You are a legal expert who explains contract terms in plain language for non-lawyers.\n\
         Summarize this contract risk analysis: state the overall risk level, the most important \
         concerns in everyday language and concrete recommendations. Avoid legal jargon.\n\n\
         Contract risk analysis results:\n{}",
        sections
    )
}

pub fn simulation(
    clauses: &[ClauseReport],
    high: usize,
    medium: usize,
    low: usize,
    safety_index: &str
) -> String {
    let issues = |level: RiskLevel, limit: usize| -> String {
        let lines: Vec<String> = clauses
            .iter()
            .filter_map(|c| {
                let assessment = c.result.completed()?;
                (assessment.risk_level == level)
                    .then(|| format!("Clause {}: {}", c.index, assessment.explanation))
            })
            .take(limit)
            .collect();
        if lines.is_empty() {
            "None identified".to_string()
        } else {
            lines.join("\n")
        }
    };

    format!(
        "You are a contract negotiation expert. Based on this risk analysis, simulate a \
         renegotiation of the risky clauses: strategies and talking points, expected risk \
         reduction, effort required and fallback options.\n\n\
         Total clauses: {}\nHigh risk: {}\nMedium risk: {}\nLow risk: {}\nSafety index: {}\n\n\
         HIGH RISK ISSUES:\n{}\n\nMEDIUM RISK ISSUES:\n{}\n",
        clauses.len(),
        high,
        medium,
        low,
        safety_index,
        issues(RiskLevel::High, usize::MAX),
        issues(RiskLevel::Medium, 5)
    )
}

pub fn translation(text: &str, language_name: &str, interests: &[String]) -> String {
    let focus = if interests.is_empty() {
        String::new()
    } else {
        format!("\nPay special attention to these areas: {}\n", interests.join(", "))
    };

    format!(
        "You are a legal expert and translator. Summarize this contract in {language}.\n\
         Focus on practical implications, obligations and risks, in clear professional language.\n{focus}\n\
         Structure the answer with these headed sections:\n\
         Contract Overview:\nKey Terms and Obligations:\nFinancial Aspects:\n\
         Important Dates and Deadlines:\nRisks and Considerations:\nRecommendations:\n\n\
         Contract text:\n{text}\n\n\
         Write the whole summary in {language}.",
        language = language_name,
        focus = focus,
        text = text
    )
}

pub fn conversation(
    message: &str,
    history: &[ConversationTurn],
    contract_context: Option<&str>
) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant specializing in legal contract analysis. Give clear, \
         accurate, plain-language answers about contract terms and risks, and remind users to \
         consult a qualified lawyer for specific legal advice. Answer in one or two sentences.\n"
    );

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in history {
            let speaker = match turn.role {
                TurnRole::User => "User",
                TurnRole::Assistant => "Assistant"
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.content));
        }
    }

    if let Some(context) = contract_context {
        prompt.push_str(&format!("\nContract being discussed:\n{}\n", context));
    }

    prompt.push_str(&format!("\nUser message: {}\n\nResponse:", message));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_keeps_short_text() {
        assert_eq!(compress_text("  Short clause.  ", 50), "Short clause.");
    }

    #[test]
    fn test_compress_keeps_first_and_last_sentence() {
        let text = "First sentence here. Middle part that is rather long and dull. Last one.";
        assert_eq!(compress_text(text, 40), "First sentence here. ... Last one.");
    }

    #[test]
    fn test_compress_truncates_single_sentence() {
        let compressed = compress_text(&"a".repeat(100), 10);
        assert_eq!(compressed, format!("{}...", "a".repeat(7)));
    }

    #[test]
    fn test_risk_batch_labels_by_document_position() {
        let batch = WorkBatch {
            batch_id: 1,
            offset: 4,
            items: vec!["Fifth clause.".to_string(), "Sixth clause.".to_string()]
        };
        let prompt = risk_batch(&batch, 800);
        assert!(prompt.contains("CLAUSE_5: Fifth clause."));
        assert!(prompt.contains("CLAUSE_6: Sixth clause."));
        assert!(!prompt.contains("CLAUSE_4:"));
    }

    #[test]
    fn test_conversation_prompt_includes_history_and_context() {
        let history = vec![
            ConversationTurn::user("Is clause 3 risky?"),
            ConversationTurn::assistant("Yes, it is one-sided.")
        ];
        let prompt = conversation("Why?", &history, Some("Supply agreement"));
        assert!(prompt.contains("User: Is clause 3 risky?"));
        assert!(prompt.contains("Assistant: Yes, it is one-sided."));
        assert!(prompt.contains("Contract being discussed:\nSupply agreement"));
        assert!(prompt.ends_with("User message: Why?\n\nResponse:"));
    }
}
