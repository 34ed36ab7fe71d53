//! Missing-information triage.

use tenderflow_protocol::{Priority, TriageResult};

/// Keywords that always make an item high priority.
const HIGH: [&str; 5] = ["budget", "cost", "timeline", "deadline", "scope"];
/// High only when no medium keyword is also present.
const GENERIC_HIGH: &str = "requirements";
const MEDIUM: [&str; 4] = ["technical", "integration", "security", "compliance"];

const HIGH_HEADER: &str = "Please provide the following critical information:";
const MEDIUM_HEADER: &str = "The following information would be helpful to refine the solution:";
const ALL_CLEAR: &str = "All critical information has been provided. The proposal can proceed.";

/// Classify one missing-information item. Total and deterministic.
pub fn classify(item: &str) -> Priority {
    let lower = item.to_lowercase();
    let has_medium = MEDIUM.iter().any(|keyword| lower.contains(keyword));
    if HIGH.iter().any(|keyword| lower.contains(keyword))
        || (lower.contains(GENERIC_HIGH) && !has_medium)
    {
        Priority::High
    } else if has_medium {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Bucket items by priority and build the clarification request.
pub fn triage(items: &[String]) -> TriageResult {
    let mut result = TriageResult {
        total_missing_items: items.len(),
        ..TriageResult::default()
    };
    for item in items {
        match classify(item) {
            Priority::High => result.high_priority.push(item.clone()),
            Priority::Medium => result.medium_priority.push(item.clone()),
            Priority::Low => result.low_priority.push(item.clone()),
        }
    }
    if !result.high_priority.is_empty() {
        result.recommendations.push(HIGH_HEADER.to_string());
        result
            .recommendations
            .extend(result.high_priority.iter().map(|item| format!("- {item}")));
    }
    if !result.medium_priority.is_empty() {
        result.recommendations.push(MEDIUM_HEADER.to_string());
        result
            .recommendations
            .extend(result.medium_priority.iter().map(|item| format!("- {item}")));
    }
    if result.recommendations.is_empty() {
        result.recommendations.push(ALL_CLEAR.to_string());
    }
    result
}
