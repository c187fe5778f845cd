//! Fuzzy header matching for statute sections and case paragraphs.
//!
//! Real corpora arrive with spacing and punctuation variations ("1.Where",
//! "1 .Where", "Section 1.", "[1] Text", tabs instead of spaces). Each
//! matcher tries an ordered list of patterns with declining base confidence,
//! scores each pattern's matches (with a bonus when the extracted numbers
//! run sequentially), and keeps the best. A line-by-line heuristic scan is
//! the last resort when no pattern fires.

use regex::Regex;

/// How a segment boundary was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Highest-confidence pattern
    Exact,
    /// Lower-confidence pattern variant
    Fuzzy,
    /// Line-scan fallback
    Heuristic,
}

/// One recognized segment (a section or a paragraph).
#[derive(Debug, Clone)]
pub struct SegmentMatch {
    /// Section or paragraph number as written (e.g. `2`, `3A`)
    pub number: String,
    /// Full text of the segment, from its header to the next header
    pub text: String,
    /// Byte offset of the segment start in the source text
    pub start: usize,
    /// Byte offset of the segment end
    pub end: usize,
    /// Confidence in the boundary (0–1)
    pub confidence: f64,
    /// How the boundary was recognized
    pub kind: MatchKind,
}

impl SegmentMatch {
    /// Leading numeric part of the segment number, for sequence checks.
    fn numeric(&self) -> Option<u64> {
        let digits: String = self.number.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// Extracts segments for one pattern: header positions become boundaries,
/// and each segment runs to the start of the next header.
fn extract_with_pattern(
    text: &str,
    pattern: &Regex,
    base_confidence: f64,
    min_len: usize,
) -> Vec<SegmentMatch> {
    let matches: Vec<_> = pattern.captures_iter(text).collect();
    let mut out = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        let whole = caps.get(0).expect("capture 0 always present");
        let number = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let start = whole.start();
        let end = matches
            .get(i + 1)
            .map(|next| next.get(0).expect("capture 0 always present").start())
            .unwrap_or(text.len());
        let segment_text = text[start..end].trim().to_string();

        if segment_text.len() < min_len {
            continue;
        }

        out.push(SegmentMatch {
            number,
            text: segment_text,
            start,
            end,
            confidence: base_confidence,
            kind: if base_confidence >= 0.95 {
                MatchKind::Exact
            } else {
                MatchKind::Fuzzy
            },
        });
    }

    out
}

fn is_sequential(numbers: &[u64]) -> bool {
    if numbers.is_empty() {
        return false;
    }
    numbers
        .iter()
        .enumerate()
        .all(|(i, &n)| n == numbers[0] + i as u64)
}

fn is_roughly_sequential(numbers: &[u64], max_gap: u64) -> bool {
    if numbers.len() < 2 {
        return false;
    }
    if numbers.windows(2).any(|w| w[1] <= w[0]) {
        return false;
    }
    let gaps: Vec<u64> = numbers.windows(2).map(|w| w[1] - w[0]).collect();
    let small = gaps.iter().filter(|&&g| g <= max_gap).count();
    small as f64 / gaps.len() as f64 > 0.7
}

/// Scores a candidate match set: average confidence plus a sequential bonus.
fn score_matches(matches: &[SegmentMatch]) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }
    let avg: f64 = matches.iter().map(|m| m.confidence).sum::<f64>() / matches.len() as f64;
    let numbers: Vec<u64> = matches.iter().filter_map(SegmentMatch::numeric).collect();
    if numbers.len() == matches.len() && is_sequential(&numbers) {
        avg + 0.1
    } else {
        avg
    }
}

/// Last-resort scan: lines that start with a number and are followed by
/// substantial text, kept only when the numbers run roughly in order.
fn heuristic_scan(
    text: &str,
    line_pattern: &Regex,
    min_len: usize,
    max_gap: u64,
) -> Vec<SegmentMatch> {
    let mut boundaries: Vec<(usize, String)> = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(caps) = line_pattern.captures(line.trim_end()) {
            if let Some(number) = caps.get(1) {
                boundaries.push((offset, number.as_str().to_string()));
            }
        }
        offset += line.len();
    }

    let mut out = Vec::new();
    for (i, (start, number)) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).map(|(s, _)| *s).unwrap_or(text.len());
        let segment_text = text[*start..end].trim().to_string();
        if segment_text.len() < min_len {
            continue;
        }
        out.push(SegmentMatch {
            number: number.clone(),
            text: segment_text,
            start: *start,
            end,
            confidence: 0.7,
            kind: MatchKind::Heuristic,
        });
    }

    let numbers: Vec<u64> = out.iter().filter_map(SegmentMatch::numeric).collect();
    if numbers.len() == out.len() && is_roughly_sequential(&numbers, max_gap) {
        out
    } else {
        Vec::new()
    }
}

/// Fuzzy matcher for statute section headers.
pub struct SectionMatcher {
    patterns: Vec<(Regex, f64)>,
    heuristic: Regex,
    min_len: usize,
}

impl SectionMatcher {
    /// Creates a matcher with the standard pattern ladder.
    pub fn new() -> Self {
        let patterns = vec![
            // Standard: "2.Where" / "2.—(1) Where"
            (
                Regex::new(r"(?m)^\s*(\d+[A-Z]?)\.(?:—)?(?:\(\d+\))?\s*([A-Z][^\n]*)")
                    .expect("valid regex"),
                1.0,
            ),
            // Space before the dot: "2 .Where"
            (
                Regex::new(r"(?m)^\s*(\d+[A-Z]?)\s+\.(?:—)?\s*([A-Z][^\n]*)")
                    .expect("valid regex"),
                0.95,
            ),
            // Labelled: "Section 2."
            (
                Regex::new(r"(?m)^\s*(?:Section|Sec\.?)\s+(\d+[A-Z]?)\.?\s*([A-Z][^\n]*)")
                    .expect("valid regex"),
                0.9,
            ),
            // No dot at all: "2 Where a person..."
            (
                Regex::new(r"(?m)^\s*(\d+[A-Z]?)\s+([A-Z][^\n]{20,})").expect("valid regex"),
                0.85,
            ),
        ];
        Self {
            patterns,
            heuristic: Regex::new(r"^\s*(\d{1,3}[A-Z]?)[\s.—]+\S").expect("valid regex"),
            min_len: 50,
        }
    }

    /// Finds section boundaries, keeping the best-scoring pattern's matches.
    pub fn find_sections(&self, text: &str) -> Vec<SegmentMatch> {
        let mut best: Vec<SegmentMatch> = Vec::new();
        let mut best_score = 0.0;

        for (pattern, confidence) in &self.patterns {
            let matches = extract_with_pattern(text, pattern, *confidence, self.min_len);
            let score = score_matches(&matches);
            if score > best_score {
                best = matches;
                best_score = score;
            }
        }

        if best.is_empty() {
            best = heuristic_scan(text, &self.heuristic, 100, 3);
        }
        best
    }
}

impl Default for SectionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Fuzzy matcher for case paragraph headers.
pub struct ParagraphMatcher {
    patterns: Vec<(Regex, f64)>,
    heuristic: Regex,
    min_len: usize,
}

impl ParagraphMatcher {
    /// Creates a matcher with the standard pattern ladder.
    pub fn new() -> Self {
        let patterns = vec![
            // Number + two or more spaces: "12  The appellant..."
            (
                Regex::new(r"(?m)^\s*(\d+)[ ]{2,}([A-Z][^\n]*)").expect("valid regex"),
                1.0,
            ),
            // Tab separated
            (
                Regex::new(r"(?m)^\s*(\d+)\t+([A-Z][^\n]*)").expect("valid regex"),
                0.95,
            ),
            // Bracketed: "[12] The appellant..."
            (
                Regex::new(r"(?m)^\s*\[(\d+)\]\s+([A-Z][^\n]*)").expect("valid regex"),
                0.95,
            ),
            // Dotted: "12. The appellant..."
            (
                Regex::new(r"(?m)^\s*(\d+)\.\s+([A-Z][^\n]*)").expect("valid regex"),
                0.9,
            ),
            // Single space (least reliable)
            (
                Regex::new(r"(?m)^\s*(\d+) ([A-Z][^0-9\n]{30,})").expect("valid regex"),
                0.8,
            ),
        ];
        Self {
            patterns,
            heuristic: Regex::new(r"^\s*\[?(\d{1,4})\]?[\s.—\t]+\S").expect("valid regex"),
            min_len: 30,
        }
    }

    /// Finds paragraph boundaries, keeping the best-scoring pattern's matches.
    pub fn find_paragraphs(&self, text: &str) -> Vec<SegmentMatch> {
        let mut best: Vec<SegmentMatch> = Vec::new();
        let mut best_score = 0.0;

        for (pattern, confidence) in &self.patterns {
            let matches = extract_with_pattern(text, pattern, *confidence, self.min_len);
            let score = score_matches(&matches);
            if score > best_score {
                best = matches;
                best_score = score;
            }
        }

        if best.is_empty() {
            best = heuristic_scan(text, &self.heuristic, self.min_len, 2);
        }
        best
    }
}

impl Default for ParagraphMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUTE_TEXT: &str = "\
1.This Act may be cited as the Misrepresentation Act and applies to contracts made after its commencement.
2.Where a person has entered into a contract after a misrepresentation has been made to him, the other party shall be liable to damages notwithstanding that the misrepresentation was not fraudulent.
3.An agreement purporting to exclude liability for misrepresentation is of no effect except in so far as it satisfies the requirement of reasonableness.
";

    #[test]
    fn test_standard_sections() {
        let matcher = SectionMatcher::new();
        let sections = matcher.find_sections(STATUTE_TEXT);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].number, "1");
        assert_eq!(sections[2].number, "3");
        assert!(sections[1].text.contains("misrepresentation"));
        assert_eq!(sections[0].kind, MatchKind::Exact);
    }

    #[test]
    fn test_lettered_section_numbers() {
        let text = "\
3.The principal provision applies to every contract of sale made in the course of business dealings.
3A.The supplementary provision extends the principal provision to contracts for the supply of services.
4.The closing provision deals with savings and transitional arrangements for existing agreements.
";
        let matcher = SectionMatcher::new();
        let sections = matcher.find_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].number, "3A");
    }

    #[test]
    fn test_sequential_bonus_prefers_ordered_pattern() {
        // The dotless pattern would also fire here, but the dotted pattern
        // matches the same boundaries with higher base confidence.
        let matcher = SectionMatcher::new();
        let sections = matcher.find_sections(STATUTE_TEXT);
        assert!(sections.iter().all(|s| s.kind == MatchKind::Exact));
    }

    #[test]
    fn test_case_paragraphs_double_space() {
        let text = "\
1  The appellant entered into a sale and purchase agreement with the respondent concerning the property.
2  The respondent failed to disclose that the property was subject to an existing encumbrance at the time.
3  The trial judge found for the respondent and the appellant now appeals against that decision in full.
";
        let matcher = ParagraphMatcher::new();
        let paras = matcher.find_paragraphs(text);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0].number, "1");
        assert!(paras[1].text.contains("encumbrance"));
    }

    #[test]
    fn test_case_paragraphs_bracketed() {
        let text = "\
[1] The plaintiff commenced proceedings against the defendant for breach of a distribution agreement.
[2] The defendant denied liability and counterclaimed for wrongful termination of the same agreement.
[3] Both parties filed extensive affidavits and the matter proceeded to trial before this court below.
";
        let matcher = ParagraphMatcher::new();
        let paras = matcher.find_paragraphs(text);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[2].number, "3");
    }

    #[test]
    fn test_short_segments_dropped() {
        let matcher = ParagraphMatcher::new();
        let paras = matcher.find_paragraphs("1  Too short.\n2  Also.\n");
        assert!(paras.is_empty() || paras.iter().all(|p| p.text.len() >= 30));
    }

    #[test]
    fn test_sequence_helpers() {
        assert!(is_sequential(&[4, 5, 6]));
        assert!(!is_sequential(&[1, 3, 4]));
        assert!(is_roughly_sequential(&[1, 2, 4, 5, 6], 3));
        assert!(!is_roughly_sequential(&[5, 3, 1], 3));
    }
}
