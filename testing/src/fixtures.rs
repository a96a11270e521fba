use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn unique_session_id() -> String {
    unique_id("test-session")
}

const CLAUSES: [&str; 10] = [
    "The Supplier shall deliver the goods described in Schedule A within thirty days of each purchase order.",
    "The Customer shall pay all invoices within fifteen days, after which interest accrues at two percent per month.",
    "The Customer shall indemnify and hold harmless the Supplier against any and all claims, without limitation.",
    "Either party may terminate this Agreement for convenience upon ninety days written notice to the other party.",
    "The Supplier warrants that the goods will be free from material defects for a warranty period of twelve months.",
    "All intellectual property created under this Agreement shall vest exclusively in the Supplier upon creation.",
    "Each party shall keep the other party's confidential information secret for five years after termination.",
    "This Agreement shall be governed by the laws of England and disputes resolved by binding arbitration in London.",
    "The Customer irrevocably waives any right to a jury trial and agrees to liquidated damages of fifty thousand dollars.",
    "Neither party is liable for delay caused by force majeure events beyond its reasonable control, including floods."
];

/// Clause texts of [`sample_contract`], in document order.
pub fn sample_clauses() -> Vec<String> {
    CLAUSES.iter().map(|c| (*c).to_string()).collect()
}

/// A ten-clause supply agreement in numbered-item layout.
pub fn sample_contract() -> String {
    let mut text = String::from("SUPPLY AGREEMENT\nAcme Ltd and Widget Co.");
    for (i, clause) in CLAUSES.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, clause));
    }
    text.push('\n');
    text
}

/// A document too short to be analysed.
pub fn short_document() -> String {
    "Pay on time.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_differ() {
        assert_ne!(unique_session_id(), unique_session_id());
    }

    #[test]
    fn test_sample_contract_lists_every_clause() {
        let contract = sample_contract();
        for (i, clause) in sample_clauses().iter().enumerate() {
            assert!(contract.contains(&format!("{}. {}", i + 1, clause)));
        }
    }
}
