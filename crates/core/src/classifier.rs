//! Per-line text-role classification.
//!
//! Roles are decided from a single line's own text and font metrics; the
//! classifier keeps no memory of earlier lines. Checks run in a fixed
//! precedence order and the first match wins. Anything unmatched is
//! [`Role::Body`].
//!
//! The citation and equation signatures are tuned on ACM/IEEE-style papers and
//! are known to over- and under-match other material. They are reproduced as
//! observed rather than tightened.

use crate::error::ExtractError;
use crate::models::{ClassifiedFragment, Line, Role};
use regex::{Regex, RegexSet};

const VENUE_TOKENS: [&str; 3] = ["uist", "acm", "ieee"];
const CAPTION_PREFIXES: [&str; 4] = ["figure ", "fig.", "table ", "equation "];

const EQUATION_PATTERNS: [&str; 7] = [
    r"[=<>≤≥≠±∞∑∏∫]",
    r"[α-ωΑ-Ω]",
    r"\^?\d+\s*=\s*",
    r"[a-zA-Z]_[a-zA-Z0-9]+",
    r"[a-zA-Z]\^[a-zA-Z0-9]+",
    r"log\s+[a-zA-Z]",
    r"\([0-9]+\)$",
];

pub const HEADING1_MIN_SIZE: f32 = 16.0;
pub const HEADING1_MIN_BOLD_SIZE: f32 = 14.0;
pub const HEADING2_MIN_SIZE: f32 = 13.0;
pub const HEADING2_MIN_BOLD_SIZE: f32 = 11.0;
pub const HEADING3_MAX_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct TextRoleClassifier {
    year: Regex,
    page_number: Regex,
    identifier: Regex,
    caption: Regex,
    equation: RegexSet,
    numbered_equation: Regex,
}

impl TextRoleClassifier {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            year: Regex::new(r"\d{4}")?,
            page_number: Regex::new(r"^\d{3,4}$")?,
            identifier: Regex::new(r"(doi|isbn|issn).*:")?,
            caption: Regex::new(r"^(figure|fig\.?|table|equation)\s+\d+")?,
            equation: RegexSet::new(EQUATION_PATTERNS)?,
            numbered_equation: Regex::new(r"\([0-9]+\)$")?,
        })
    }

    pub fn classify(&self, line: &Line) -> Role {
        let text = line.text.as_str();

        if self.is_citation_or_footer(text) {
            return Role::CitationOrFooter;
        }
        if self.is_figure_caption(text) {
            return Role::FigureCaption;
        }
        if self.is_equation(text) {
            return Role::Equation;
        }

        heading_role(line).unwrap_or(Role::Body)
    }

    pub fn classify_fragment(&self, line: Line) -> ClassifiedFragment {
        let role = self.classify(&line);
        ClassifiedFragment { line, role }
    }

    /// Session banners, venue/year running headers, bare page numbers,
    /// permission notices and identifier lines.
    pub fn is_citation_or_footer(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();

        if lowered.contains("session") && (lowered.contains("brain") || lowered.contains("taste")) {
            return true;
        }

        if self.year.is_match(text) && VENUE_TOKENS.iter().any(|token| lowered.contains(token)) {
            return true;
        }

        if self.page_number.is_match(text.trim()) {
            return true;
        }

        if lowered.contains("permission")
            && (lowered.contains("make digital") || lowered.contains("copyright"))
        {
            return true;
        }

        self.identifier.is_match(&lowered)
    }

    pub fn is_figure_caption(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        CAPTION_PREFIXES
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
            || self.caption.is_match(&lowered)
    }

    pub fn is_equation(&self, text: &str) -> bool {
        self.equation.is_match(text)
    }

    /// Display equations carry a trailing `(n)` label.
    pub fn is_numbered_equation(&self, text: &str) -> bool {
        self.numbered_equation.is_match(text)
    }
}

fn heading_role(line: &Line) -> Option<Role> {
    let size = line.font_size;

    if size > HEADING1_MIN_SIZE || (line.is_bold && size > HEADING1_MIN_BOLD_SIZE) {
        Some(Role::Heading1)
    } else if size > HEADING2_MIN_SIZE || (line.is_bold && size > HEADING2_MIN_BOLD_SIZE) {
        Some(Role::Heading2)
    } else if line.is_bold && line.text.chars().count() < HEADING3_MAX_CHARS {
        Some(Role::Heading3)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TextRoleClassifier {
        TextRoleClassifier::new().expect("patterns should compile")
    }

    fn body(text: &str) -> Line {
        Line::new(text, 10.0)
    }

    #[test]
    fn large_text_is_heading_one_regardless_of_bold() {
        let classifier = classifier();
        for size in [16.5, 18.0, 24.0, 72.0] {
            assert_eq!(classifier.classify(&Line::new("Introduction", size)), Role::Heading1);
            assert_eq!(
                classifier.classify(&Line::new("Introduction", size).bold()),
                Role::Heading1
            );
        }
    }

    #[test]
    fn earlier_rules_win_over_large_fonts() {
        let classifier = classifier();
        assert_eq!(classifier.classify(&Line::new("x = 1", 20.0)), Role::Equation);
        assert_eq!(classifier.classify(&Line::new("Table 1", 20.0)), Role::FigureCaption);
        assert_eq!(classifier.classify(&Line::new("2014", 20.0)), Role::CitationOrFooter);
    }

    #[test]
    fn heading_thresholds_depend_on_weight() {
        let classifier = classifier();
        assert_eq!(classifier.classify(&Line::new("Method", 15.0).bold()), Role::Heading1);
        assert_eq!(classifier.classify(&Line::new("Method", 15.0)), Role::Heading2);
        assert_eq!(classifier.classify(&Line::new("Method", 12.0).bold()), Role::Heading2);
        assert_eq!(classifier.classify(&Line::new("Method", 10.0).bold()), Role::Heading3);
        assert_eq!(classifier.classify(&Line::new("Method", 10.0)), Role::Body);
    }

    #[test]
    fn long_bold_text_stays_body() {
        let classifier = classifier();
        let text = "word ".repeat(25);
        assert_eq!(classifier.classify(&Line::new(text.trim(), 10.0).bold()), Role::Body);
    }

    #[test]
    fn page_numbers_are_footers() {
        let classifier = classifier();
        for text in ["123", "2024", " 417 "] {
            assert_eq!(classifier.classify(&body(text)), Role::CitationOrFooter);
        }
        assert_ne!(classifier.classify(&body("12")), Role::CitationOrFooter);
        assert_ne!(classifier.classify(&body("12345")), Role::CitationOrFooter);
    }

    #[test]
    fn running_headers_and_notices_are_footers() {
        let classifier = classifier();
        let samples = [
            "Session: Brain Computer Interfaces",
            "UIST '14, October 5-8, 2014, Honolulu, HI, USA",
            "Copyright 2014 ACM 978-1-4503-3069-5/14/10",
            "Permission to make digital or hard copies of all or part of this work",
            "DOI: 10.1145/2642918.2647399",
            "ISBN: 978-1-4503-3069-5",
        ];
        for text in samples {
            assert_eq!(classifier.classify(&body(text)), Role::CitationOrFooter, "{text}");
        }
    }

    #[test]
    fn captions_are_detected_case_insensitively() {
        let classifier = classifier();
        let samples = [
            "Figure 3: Results of the experiment on rats.",
            "FIG. 2 Overview",
            "Table 1 Participants",
            "equation 4 shows",
            "Fig 12 Ablation",
        ];
        for text in samples {
            assert_eq!(classifier.classify(&body(text)), Role::FigureCaption, "{text}");
        }
    }

    #[test]
    fn caption_beats_heading_metrics() {
        let classifier = classifier();
        let line = Line::new("Figure 1 Architecture", 20.0).bold();
        assert_eq!(classifier.classify(&line), Role::FigureCaption);
    }

    #[test]
    fn footer_beats_caption() {
        let classifier = classifier();
        let line = body("Table 2 from IEEE 2019 proceedings");
        assert_eq!(classifier.classify(&line), Role::CitationOrFooter);
    }

    #[test]
    fn equations_match_operator_and_symbol_signatures() {
        let classifier = classifier();
        let samples = [
            "E = mc^2",
            "where α controls the rate",
            "x_i is the input",
            "a^n grows",
            "log p of the sequence",
            "f(x) + g(x) (3)",
            "3 = three",
        ];
        for text in samples {
            assert_eq!(classifier.classify(&body(text)), Role::Equation, "{text}");
        }
    }

    #[test]
    fn numbered_equation_requires_trailing_label() {
        let classifier = classifier();
        assert!(classifier.is_numbered_equation("y = ax + b (12)"));
        assert!(!classifier.is_numbered_equation("y = ax + b"));
        assert!(!classifier.is_numbered_equation("(12) y = ax + b"));
    }

    #[test]
    fn unmatched_text_falls_through_to_body() {
        let classifier = classifier();
        let line = body("Participants completed the task in two sessions.");
        assert_eq!(classifier.classify(&line), Role::Body);
    }

    #[test]
    fn classify_fragment_keeps_the_line() {
        let classifier = classifier();
        let fragment = classifier.classify_fragment(Line::new("Abstract", 12.0).bold());
        assert_eq!(fragment.role, Role::Heading2);
        assert_eq!(fragment.line.text, "Abstract");
    }
}
