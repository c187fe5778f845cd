//! Synthesis quality scoring.
//!
//! An acceptable answer has four sections with fixed semantic roles. Each
//! is scored 0–1 by presence-and-quality heuristics and combined by weight;
//! synthesis carries the highest weight because coupling statutory text to
//! judicial interpretation is the whole point of the system. An answer with
//! no synthesis language at all cannot pass, whatever the other sections
//! score.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Section weights; synthesis is deliberately the heaviest.
const WEIGHT_STATUTE: f64 = 0.25;
const WEIGHT_INTERPRETATION: f64 = 0.25;
const WEIGHT_SYNTHESIS: f64 = 0.30;
const WEIGHT_PRACTICAL: f64 = 0.20;

/// Overall score needed to pass.
pub const PASS_THRESHOLD: f64 = 0.70;

/// Synthesis phrase hits needed for full credit.
const PHRASES_FOR_FULL_CREDIT: usize = 3;

/// Connective phrases that couple statute to interpretation.
const SYNTHESIS_PHRASES: &[&str] = &[
    "while the statute",
    "while the statutory",
    "although the statute",
    "the court clarified",
    "the courts have interpreted",
    "the court interpreted",
    "the court has construed",
    "has narrowed",
    "has broadened",
    "has significantly narrowed",
    "case law has limited",
    "case law has narrowed",
    "taking the statutory framework together",
    "must be read in light of",
    "the plain text suggests",
    "effectively narrowing",
    "effectively broadening",
];

/// Connectives that open a practical-effect section.
const PRACTICAL_OPENERS: &[&str] = &["therefore", "in practice", "this means", "accordingly"];

/// Words that signal an actionable consequence.
const ACTIONABLE_MARKERS: &[&str] = &[
    "must", "cannot", "should", "required", "entitled", "prove", "liable", "may not",
];

/// Per-section and overall scores for one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    /// Weighted overall score in `[0, 1]`
    pub overall: f64,
    /// Statutory-provision section score
    pub statute_score: f64,
    /// Judicial-interpretation section score
    pub interpretation_score: f64,
    /// Synthesis section score (highest weight)
    pub synthesis_score: f64,
    /// Practical-effect section score
    pub practical_effect_score: f64,
    /// Sections scoring too low to count as present
    pub missing_sections: Vec<String>,
    /// Whether the answer passes
    pub passed: bool,
    /// Repair suggestions for missing or weak sections
    pub feedback: Vec<String>,
    /// Synthesis phrases that were found
    pub detected_phrases: Vec<String>,
}

/// Scores answers for the four-section synthesis structure.
pub struct SynthesisScorer {
    section_ref: Regex,
    rule_ref: Regex,
    citation: Regex,
    pinpoint: Regex,
    quote: Regex,
    act_name: Regex,
    holding_verb: Regex,
}

impl SynthesisScorer {
    /// Creates a scorer.
    pub fn new() -> Self {
        Self {
            section_ref: Regex::new(r"(?i)\bsection\s+\d+[A-Z]?(?:\(\d+\))?").expect("valid regex"),
            rule_ref: Regex::new(r"(?i)\border\s+\d+\s+rule\s+\d+").expect("valid regex"),
            citation: Regex::new(r"\[\d{4}\]\s+[A-Z]+(?:\([A-Z]+\))?\s+\d+").expect("valid regex"),
            pinpoint: Regex::new(r"¶\s*\d+|\bat\s+\[\d+\]").expect("valid regex"),
            quote: Regex::new(r#""[^"]{20,}"|“[^”]{20,}”"#).expect("valid regex"),
            act_name: Regex::new(r"[A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*)*\s+Act\b").expect("valid regex"),
            holding_verb: Regex::new(r"(?i)\b(held|holds|clarified|stated|observed|ruled|found)\b")
                .expect("valid regex"),
        }
    }

    /// Scores one answer.
    pub fn score(&self, answer: &str) -> SynthesisReport {
        let lower = answer.to_lowercase();

        let statute_score = self.score_statute(answer);
        let interpretation_score = self.score_interpretation(answer);
        let (synthesis_score, detected_phrases) = self.score_synthesis(&lower);
        let practical_effect_score = self.score_practical(&lower);

        let overall = WEIGHT_STATUTE * statute_score
            + WEIGHT_INTERPRETATION * interpretation_score
            + WEIGHT_SYNTHESIS * synthesis_score
            + WEIGHT_PRACTICAL * practical_effect_score;

        let mut missing_sections = Vec::new();
        let mut feedback = Vec::new();
        for (name, score, suggestion) in [
            (
                "statute",
                statute_score,
                "quote the statutory provision verbatim with its section number and Act name",
            ),
            (
                "interpretation",
                interpretation_score,
                "cite at least one case with a pinpoint paragraph, e.g. [2013] SGCA 36, ¶158",
            ),
            (
                "synthesis",
                synthesis_score,
                "connect statute and case law with synthesis language, e.g. \"while the statute provides X, the court held Y\"",
            ),
            (
                "practical_effect",
                practical_effect_score,
                "close with the combined effect, starting \"Therefore, ...\" or \"In practice, ...\"",
            ),
        ] {
            if score < 0.3 {
                missing_sections.push(name.to_string());
                feedback.push(format!("missing {name}: {suggestion}"));
            } else if score < 0.7 {
                feedback.push(format!("weak {name}: {suggestion}"));
            }
        }

        // Synthesis is mandatory: without any synthesis language the answer
        // fails regardless of the other sections.
        let passed = overall >= PASS_THRESHOLD && synthesis_score > 0.0;

        SynthesisReport {
            overall,
            statute_score,
            interpretation_score,
            synthesis_score,
            practical_effect_score,
            missing_sections,
            passed,
            feedback,
            detected_phrases,
        }
    }

    /// Statute section: a section (or rule) identifier, ideally with a
    /// verbatim quote and the Act's name.
    fn score_statute(&self, answer: &str) -> f64 {
        let has_ref = self.section_ref.is_match(answer) || self.rule_ref.is_match(answer);
        if !has_ref {
            return 0.0;
        }
        let mut score: f64 = 0.6;
        if self.quote.is_match(answer) {
            score += 0.2;
        }
        if self.act_name.is_match(answer) || self.rule_ref.is_match(answer) {
            score += 0.2;
        }
        score.min(1.0)
    }

    /// Interpretation section: a case citation, ideally pinpointed, with a
    /// holding verb.
    fn score_interpretation(&self, answer: &str) -> f64 {
        if !self.citation.is_match(answer) {
            return 0.0;
        }
        let mut score: f64 = 0.5;
        if self.pinpoint.is_match(answer) {
            score += 0.3;
        }
        if self.holding_verb.is_match(answer) {
            score += 0.2;
        }
        score.min(1.0)
    }

    /// Synthesis section: enumerated connective phrases; full credit at
    /// three distinct hits.
    fn score_synthesis(&self, lower: &str) -> (f64, Vec<String>) {
        let detected: Vec<String> = SYNTHESIS_PHRASES
            .iter()
            .filter(|phrase| lower.contains(**phrase))
            .map(|phrase| phrase.to_string())
            .collect();
        let score = (detected.len() as f64 / PHRASES_FOR_FULL_CREDIT as f64).min(1.0);
        (score, detected)
    }

    /// Practical effect: a summarizing connective plus an actionable
    /// consequence.
    fn score_practical(&self, lower: &str) -> f64 {
        let has_opener = PRACTICAL_OPENERS.iter().any(|opener| lower.contains(opener));
        if !has_opener {
            return 0.0;
        }
        let mut score: f64 = 0.6;
        if ACTIONABLE_MARKERS.iter().any(|marker| lower.contains(marker)) {
            score += 0.4;
        }
        score.min(1.0)
    }
}

impl Default for SynthesisScorer {
    fn default() -> Self {
        Self::new()
    }
}
