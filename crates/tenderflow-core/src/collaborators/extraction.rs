//! Pattern-based requirement extraction and document structure heuristics.

use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use tenderflow_protocol::{DocumentStructure, Requirements};

/// Everything the analysis stage derives from raw tender text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub requirements: Requirements,
    pub missing_information: Vec<String>,
    pub structure: DocumentStructure,
}

impl ExtractionReport {
    /// Confidence in `[0, 1]`: document quality and requirement coverage,
    /// minus a capped penalty for missing information.
    pub fn confidence(&self) -> f64 {
        let quality = f64::from(self.structure.quality_score) / 100.0 * 0.3;
        let coverage = (self.requirements.total_items() as f64 / 20.0).min(1.0) * 0.4;
        let penalty = (self.missing_information.len() as f64 * 0.1).min(0.3);
        (quality + coverage - penalty).clamp(0.0, 1.0)
    }
}

pub trait RequirementExtractor: Send + Sync {
    fn extract(&self, text: &str) -> ExtractionReport;
}

const FUNCTIONAL: &[&str] = &[
    r"(?:must|should|shall)\s+(?:be\s+)?(?:able\s+to\s+)?(.+?)(?:\.|$)",
    r"system\s+(?:must|should|shall)\s+(?:be\s+)?(?:able\s+to\s+)?(.+?)(?:\.|$)",
];
const BUDGET: &[&str] = &[
    r"budget[:\s]+([^.\n]+)",
    r"cost[:\s]+([^.\n]+)",
    r"price[:\s]+([^.\n]+)",
    r"(\$[\d,]+)",
    r"([\d,]+\s*(?:USD|EUR|GBP))",
];
const TIMELINE: &[&str] = &[
    r"(?:deadline|timeline|duration)[:\s]+([^.\n]+)",
    r"(\d+\s*(?:weeks?|months?|days?))",
];
const TECHNICAL: &[&str] = &[r"(?:technology|platform|framework|language|database)[:\s]+([^.\n]+)"];
const BACKGROUND: &[&str] = &[r"(?:about|background|company|organization)[:\s]+([^.\n]+)"];
const SCOPE: &[&str] = &[
    r"scope[:\s]+([^.\n]+)",
    r"objective[:\s]+([^.\n]+)",
    r"goal[:\s]+([^.\n]+)",
];
const STAKEHOLDERS: &[&str] = &[r"(?:stakeholders?|contact)[:\s]+([^.\n]+)"];
const SUCCESS: &[&str] = &[r"(?:success\s+criteria|kpis?|metrics?)[:\s]+([^.\n]+)"];
const NON_FUNCTIONAL: &str =
    r"performance|availability|uptime|scalability|response\s+time|security|usability|reliability";
const SECTION_HEADING: &str = r"^\d+\.\s+[A-Z]";

const MISSING_CHECKS: &[(&str, &str)] = &[
    ("budget", r"budget|cost|price|financial"),
    ("timeline", r"deadline|timeline|duration|schedule"),
    (
        "technical specifications",
        r"technology|platform|framework|architecture",
    ),
    ("success criteria", r"success|criteria|metrics|kpi"),
    ("stakeholders", r"stakeholder|contact|person|team"),
    ("current system", r"existing|current|legacy|system"),
    ("integration requirements", r"integration|api|interface|connect"),
    (
        "security requirements",
        r"security|authentication|authorization|encryption",
    ),
    (
        "compliance requirements",
        r"compliance|regulation|standard|certification",
    ),
];

const STRUCTURE_FLAGS: [(&str, u32); 5] = [
    (r"executive\s+summary|overview|introduction", 20),
    (r"requirement|specification|scope", 25),
    (r"technical|technology|architecture|system", 25),
    (r"timeline|schedule|deadline|duration", 15),
    (r"budget|cost|price|financial", 15),
];

fn compile(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(
                "skipping extraction pattern that failed to compile (pattern={}, error={})",
                pattern, err
            );
            None
        }
    }
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| compile(pattern, true))
        .collect()
}

/// First capture group of every match, in text order.
fn captures(regexes: &[Regex], text: &str) -> Vec<String> {
    regexes
        .iter()
        .flat_map(|regex| {
            regex
                .captures_iter(text)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        })
        .filter(|value| !value.is_empty())
        .collect()
}

/// Regex heuristics over plain tender text. Patterns compile once.
pub struct PatternExtractor {
    functional: Vec<Regex>,
    budget: Vec<Regex>,
    timeline: Vec<Regex>,
    technical: Vec<Regex>,
    background: Vec<Regex>,
    scope: Vec<Regex>,
    stakeholders: Vec<Regex>,
    success: Vec<Regex>,
    non_functional: Option<Regex>,
    section_heading: Option<Regex>,
    missing_checks: Vec<(&'static str, Regex)>,
    structure_flags: Vec<(Regex, u32)>,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            functional: compile_all(FUNCTIONAL),
            budget: compile_all(BUDGET),
            timeline: compile_all(TIMELINE),
            technical: compile_all(TECHNICAL),
            background: compile_all(BACKGROUND),
            scope: compile_all(SCOPE),
            stakeholders: compile_all(STAKEHOLDERS),
            success: compile_all(SUCCESS),
            non_functional: compile(NON_FUNCTIONAL, true),
            section_heading: compile(SECTION_HEADING, false),
            missing_checks: MISSING_CHECKS
                .iter()
                .filter_map(|(name, pattern)| compile(pattern, true).map(|regex| (*name, regex)))
                .collect(),
            structure_flags: STRUCTURE_FLAGS
                .iter()
                .filter_map(|(pattern, weight)| compile(pattern, true).map(|regex| (regex, *weight)))
                .collect(),
        }
    }

    fn requirements(&self, text: &str) -> Requirements {
        let mut requirements = Requirements::default();
        let fill = |set: &mut std::collections::BTreeSet<String>, values: Vec<String>| {
            for value in values {
                Requirements::insert(set, &value);
            }
        };
        fill(
            &mut requirements.functional_requirements,
            captures(&self.functional, text),
        );
        fill(
            &mut requirements.budget_constraints,
            captures(&self.budget, text),
        );
        fill(
            &mut requirements.timeline_constraints,
            captures(&self.timeline, text),
        );
        fill(
            &mut requirements.technical_constraints,
            captures(&self.technical, text),
        );
        fill(
            &mut requirements.key_stakeholders,
            captures(&self.stakeholders, text),
        );
        fill(
            &mut requirements.success_criteria,
            captures(&self.success, text),
        );
        if let Some(regex) = &self.non_functional {
            let sentences = text
                .split(['.', '!', '?', '\n'])
                .map(str::trim)
                .filter(|sentence| regex.is_match(sentence))
                .map(str::to_string)
                .collect();
            fill(&mut requirements.non_functional_requirements, sentences);
        }

        requirements.client_background = captures(&self.background, text).join(" ");
        requirements.project_scope = self
            .scope
            .iter()
            .map(|regex| captures(std::slice::from_ref(regex), text))
            .find(|matches| !matches.is_empty())
            .map(|matches| matches.join(" "))
            .unwrap_or_default();
        requirements
    }

    fn missing_information(&self, text: &str) -> Vec<String> {
        self.missing_checks
            .iter()
            .filter(|(_, regex)| !regex.is_match(text))
            .map(|(name, _)| format!("Missing {name} information"))
            .collect()
    }

    fn structure(&self, text: &str) -> DocumentStructure {
        let sections = text
            .lines()
            .map(str::trim)
            .filter(|line| {
                let all_caps = line.chars().any(char::is_alphabetic)
                    && !line.chars().any(char::is_lowercase);
                let numbered = self
                    .section_heading
                    .as_ref()
                    .is_some_and(|regex| regex.is_match(line));
                !line.is_empty() && (all_caps || numbered)
            })
            .map(str::to_string)
            .collect();
        let flags: Vec<bool> = self
            .structure_flags
            .iter()
            .map(|(regex, _)| regex.is_match(text))
            .collect();
        let quality_score = self
            .structure_flags
            .iter()
            .zip(&flags)
            .filter(|(_, hit)| **hit)
            .map(|((_, weight), _)| *weight)
            .sum();
        let flag = |idx: usize| flags.get(idx).copied().unwrap_or(false);
        DocumentStructure {
            sections,
            word_count: text.split_whitespace().count(),
            has_executive_summary: flag(0),
            has_requirements_section: flag(1),
            has_technical_specifications: flag(2),
            has_timeline: flag(3),
            has_budget: flag(4),
            quality_score,
        }
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequirementExtractor for PatternExtractor {
    fn extract(&self, text: &str) -> ExtractionReport {
        let report = ExtractionReport {
            requirements: self.requirements(text),
            missing_information: self.missing_information(text),
            structure: self.structure(text),
        };
        debug!(
            "extracted requirements (items={}, missing={}, quality={})",
            report.requirements.total_items(),
            report.missing_information.len(),
            report.structure.quality_score
        );
        report
    }
}
