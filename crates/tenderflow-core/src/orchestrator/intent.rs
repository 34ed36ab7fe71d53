//! Keyword routing for free-text requests.

use serde::Serialize;

/// What a free-text request asks the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Status,
    MissingInfo,
    Summary,
    NewAnalysis,
    /// Run the next recommended stage.
    Continue,
}

impl Intent {
    /// Route a message by the first keyword group it mentions.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|word| lower.contains(word));
        if mentions(&["status", "progress"]) {
            Intent::Status
        } else if mentions(&["missing", "clarif"]) {
            Intent::MissingInfo
        } else if mentions(&["summary"]) {
            Intent::Summary
        } else if mentions(&["analy", "tender", "rfp", "new"]) {
            Intent::NewAnalysis
        } else {
            Intent::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;
    use pretty_assertions::assert_eq;

    #[test]
    fn routes_by_keyword_group() {
        assert_eq!(Intent::classify("What is the STATUS?"), Intent::Status);
        assert_eq!(Intent::classify("show progress"), Intent::Status);
        assert_eq!(
            Intent::classify("what needs clarification"),
            Intent::MissingInfo
        );
        assert_eq!(Intent::classify("give me a summary"), Intent::Summary);
        assert_eq!(Intent::classify("Analyze this RFP"), Intent::NewAnalysis);
        assert_eq!(Intent::classify("go on"), Intent::Continue);
        assert_eq!(Intent::classify(""), Intent::Continue);
    }

    #[test]
    fn earlier_groups_win() {
        assert_eq!(
            Intent::classify("status of the new tender"),
            Intent::Status
        );
        assert_eq!(
            Intent::classify("summary of missing items"),
            Intent::MissingInfo
        );
    }
}
