use async_trait::async_trait;
use cg_core::DocumentExtractor;
use config::PipelineConfig;
use errors::ExtractionError;
use regex::Regex;
use std::sync::LazyLock;

static CLAUSE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\d+\.|\n\s*[-•]\s").unwrap());

/// Splits a UTF-8 text document into clauses on numbered-item and bullet
/// boundaries.
pub struct PlainTextExtractor {
    min_document_chars: usize,
    min_clause_chars: usize
}

impl PlainTextExtractor {
    pub fn new(min_document_chars: usize, min_clause_chars: usize) -> Self {
        Self {
            min_document_chars,
            min_clause_chars
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_document_chars, config.min_clause_chars)
    }

    pub fn split_clauses(&self, text: &str) -> Vec<String> {
        CLAUSE_BOUNDARY
            .split(text)
            .map(str::trim)
            .filter(|c| c.chars().count() >= self.min_clause_chars)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract_clauses(&self, document: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let text = std::str::from_utf8(document).map_err(|e| ExtractionError::Unreadable {
            reason: e.to_string()
        })?;

        let length = text.trim().chars().count();
        if length < self.min_document_chars {
            return Err(ExtractionError::Empty {
                length,
                min: self.min_document_chars
            });
        }

        let clauses = self.split_clauses(text);
        if clauses.is_empty() {
            return Err(ExtractionError::NoClauses);
        }

        tracing::debug!(clauses = clauses.len(), "Document split into clauses");
        Ok(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PlainTextExtractor {
        PlainTextExtractor::new(100, 50)
    }

    #[tokio::test]
    async fn test_sample_contract_yields_ten_clauses() {
        let clauses = extractor()
            .extract_clauses(testing::sample_contract().as_bytes())
            .await
            .unwrap();
        assert_eq!(clauses, testing::sample_clauses());
    }

    #[tokio::test]
    async fn test_short_document_is_empty() {
        let err = extractor()
            .extract_clauses(testing::short_document().as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Empty { min: 100, .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_unreadable() {
        let err = extractor()
            .extract_clauses(&[0xff, 0xfe, 0xfd])
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn test_only_short_fragments_means_no_clauses() {
        let text = "Heading\n1. Too short.\n2. Also short.\n- tiny\n".repeat(5);
        let err = extractor().extract_clauses(text.as_bytes()).await.unwrap_err();
        assert_eq!(err, ExtractionError::NoClauses);
    }

    #[test]
    fn test_bullets_split() {
        let text = "Intro\n- The tenant shall maintain the premises in good repair at all times.\n- The landlord may inspect the premises with twenty four hours notice.";
        let clauses = extractor().split_clauses(text);
        assert_eq!(clauses.len(), 2);
        assert!(clauses[1].starts_with("The landlord"));
    }
}
