//! Page-level markdown reconstruction.
//!
//! Each text block of a page is walked line by line. Classified lines are fed
//! to [`PageReconstructor::apply`], which either emits markdown immediately
//! (headings, equations, footers) or parks the line in a
//! [`ReconstructionState`] buffer until a different role or the end of the
//! block forces a flush.

use crate::classifier::TextRoleClassifier;
use crate::error::ExtractError;
use crate::models::{BlockKind, ClassifiedFragment, Line, Role, SourceBlock};
use crate::paragraph::{assemble_group, assemble_styled_group};

/// Footers at or below this many characters are dropped from the output.
pub const MIN_VISIBLE_FOOTER_CHARS: usize = 20;

/// Buffers that live for one source block.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconstructionState {
    pub current_group: Vec<Line>,
    pub figure_caption_buffer: Vec<String>,
}

impl ReconstructionState {
    pub fn is_empty(&self) -> bool {
        self.current_group.is_empty() && self.figure_caption_buffer.is_empty()
    }

    /// Mid-block flush ahead of a footer, caption, equation or heading. The
    /// paragraph is emitted without emphasis.
    pub fn flush_group(&mut self, out: &mut String) {
        self.flush_group_with(out, assemble_group);
    }

    /// End-of-block flush; the first line's italic or bold wraps the paragraph.
    pub fn flush_closing_group(&mut self, out: &mut String) {
        self.flush_group_with(out, assemble_styled_group);
    }

    fn flush_group_with(&mut self, out: &mut String, assemble: fn(&[Line]) -> String) {
        if self.current_group.is_empty() {
            return;
        }
        let paragraph = assemble(&self.current_group);
        self.current_group.clear();
        if !paragraph.is_empty() {
            out.push_str(&paragraph);
            out.push_str("\n\n");
        }
    }

    pub fn flush_captions(&mut self, out: &mut String) {
        if self.figure_caption_buffer.is_empty() {
            return;
        }
        let caption = self.figure_caption_buffer.join(" ");
        self.figure_caption_buffer.clear();
        out.push_str(&format!("**{caption}**\n\n"));
    }
}

#[derive(Debug, Clone)]
pub struct PageReconstructor {
    classifier: TextRoleClassifier,
    include_page_numbers: bool,
}

impl PageReconstructor {
    pub fn new(include_page_numbers: bool) -> Result<Self, ExtractError> {
        Ok(Self::with_classifier(
            TextRoleClassifier::new()?,
            include_page_numbers,
        ))
    }

    pub fn with_classifier(classifier: TextRoleClassifier, include_page_numbers: bool) -> Self {
        Self {
            classifier,
            include_page_numbers,
        }
    }

    pub fn classifier(&self) -> &TextRoleClassifier {
        &self.classifier
    }

    pub fn include_page_numbers(&self) -> bool {
        self.include_page_numbers
    }

    /// Renders one page. `page_number` is 1-based.
    pub fn reconstruct_page(&self, blocks: &[SourceBlock], page_number: usize) -> String {
        let mut out = page_header(page_number, self.include_page_numbers);

        for block in blocks {
            if block.kind != BlockKind::Text {
                continue;
            }

            let mut state = ReconstructionState::default();
            for source_line in &block.lines {
                let Some(line) = Line::from_spans(&source_line.spans) else {
                    continue;
                };
                let fragment = self.classifier.classify_fragment(line);
                self.apply(&mut state, fragment, &mut out);
            }
            self.finish_block(&mut state, &mut out);
        }

        out
    }

    /// Routes one classified line through the flush/accumulate protocol.
    pub fn apply(
        &self,
        state: &mut ReconstructionState,
        fragment: ClassifiedFragment,
        out: &mut String,
    ) {
        let ClassifiedFragment { line, role } = fragment;

        match role {
            Role::CitationOrFooter => {
                state.flush_group(out);
                if line.text.chars().count() > MIN_VISIBLE_FOOTER_CHARS {
                    out.push_str(&format!("*{}*\n\n", line.text));
                }
            }
            Role::FigureCaption => {
                state.flush_group(out);
                state.figure_caption_buffer.push(line.text);
            }
            Role::Equation => {
                state.flush_captions(out);
                state.flush_group(out);
                if self.classifier.is_numbered_equation(&line.text) {
                    out.push_str(&format!("```\n{}\n```\n\n", line.text));
                } else {
                    out.push_str(&format!("*{}*\n\n", line.text));
                }
            }
            Role::Heading1 | Role::Heading2 | Role::Heading3 => {
                state.flush_captions(out);
                state.flush_group(out);
                let level = role.heading_level().unwrap_or(3) as usize;
                out.push_str(&format!("\n{} {}\n\n", "#".repeat(level), line.text));
            }
            Role::Body => {
                state.flush_captions(out);
                state.current_group.push(line);
            }
        }
    }

    pub fn finish_block(&self, state: &mut ReconstructionState, out: &mut String) {
        state.flush_closing_group(out);
        state.flush_captions(out);
    }
}

/// Spacing (and optionally a divider plus `## Page N`) that opens a
/// structured page.
pub fn page_header(page_number: usize, include_page_numbers: bool) -> String {
    if include_page_numbers {
        format!("\n\n---\n\n## Page {page_number}\n\n")
    } else {
        "\n\n".to_string()
    }
}

/// Wraps fallback page text with the same page-number policy.
pub fn fallback_page(text: &str, page_number: usize, include_page_numbers: bool) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    if include_page_numbers {
        format!("\n\n## Page {page_number}\n\n{text}")
    } else {
        format!("\n\n{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{to_blocks, ContentBlock};
    use crate::models::{PositionedSpan, SourceLine};

    fn reconstructor() -> PageReconstructor {
        PageReconstructor::new(false).expect("classifier should build")
    }

    fn line(text: &str, size: f32) -> SourceLine {
        SourceLine {
            spans: vec![PositionedSpan::new(text, size)],
        }
    }

    fn bold_line(text: &str, size: f32) -> SourceLine {
        SourceLine {
            spans: vec![PositionedSpan::new(text, size).bold()],
        }
    }

    #[test]
    fn caption_is_flushed_before_following_body() {
        let blocks = vec![SourceBlock::text(vec![
            line("Figure 3: Results of the experiment on rats.", 9.0),
            line("As shown above, rats outperform controls.", 10.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\n**Figure 3: Results of the experiment on rats.**\n\nAs shown above, rats outperform controls.\n\n"
        );
    }

    #[test]
    fn multi_line_caption_is_folded_at_block_end() {
        let blocks = vec![SourceBlock::text(vec![
            line("Paragraph before the figure", 10.0),
            line("Figure 1: Overview of the", 9.0),
            line("Table 2 continued caption", 9.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\nParagraph before the figure\n\n**Figure 1: Overview of the Table 2 continued caption**\n\n"
        );
    }

    #[test]
    fn headings_flush_body_and_are_not_buffered() {
        let blocks = vec![SourceBlock::text(vec![
            line("Some body text", 10.0),
            line("continues here.", 10.0),
            line("Introduction", 18.0),
            bold_line("Background", 12.0),
            bold_line("Related work", 10.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\nSome body text continues here.\n\n\n# Introduction\n\n\n## Background\n\n\n### Related work\n\n"
        );
    }

    #[test]
    fn short_footers_are_dropped_and_long_ones_emphasized() {
        let blocks = vec![SourceBlock::text(vec![
            line("Body before", 10.0),
            line("417", 10.0),
            line("UIST 2014, October 5-8, Honolulu", 8.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\nBody before\n\n*UIST 2014, October 5-8, Honolulu*\n\n"
        );
    }

    #[test]
    fn footer_does_not_flush_pending_caption() {
        let mut state = ReconstructionState::default();
        let reconstructor = reconstructor();
        let mut out = String::new();

        for text in ["Figure 2 Setup", "123", "of the rig"] {
            let fragment = reconstructor.classifier().classify_fragment(Line::new(text, 10.0));
            reconstructor.apply(&mut state, fragment, &mut out);
        }

        assert_eq!(out, "**Figure 2 Setup**\n\n");
        assert_eq!(state.current_group.len(), 1);
        assert!(state.figure_caption_buffer.is_empty());

        reconstructor.finish_block(&mut state, &mut out);
        assert_eq!(out, "**Figure 2 Setup**\n\nof the rig\n\n");
        assert!(state.is_empty());
    }

    #[test]
    fn equations_render_by_numbering() {
        let blocks = vec![SourceBlock::text(vec![
            line("y = ax + b (1)", 10.0),
            line("where α is small", 10.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\n```\ny = ax + b (1)\n```\n\n*where α is small*\n\n"
        );
    }

    #[test]
    fn buffers_do_not_cross_blocks() {
        let blocks = vec![
            SourceBlock::text(vec![line("first block without stop", 10.0)]),
            SourceBlock::image(),
            SourceBlock::text(vec![line("second block", 10.0)]),
        ];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(markdown, "\n\nfirst block without stop\n\nsecond block\n\n");
    }

    #[test]
    fn emphasis_comes_from_first_body_line() {
        let blocks = vec![SourceBlock::text(vec![
            SourceLine {
                spans: vec![PositionedSpan::new("An italic opening that runs long enough to stay body text and keeps", 10.0).italic()],
            },
            line("going on.", 10.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\n*An italic opening that runs long enough to stay body text and keeps going on.*\n\n"
        );
    }

    #[test]
    fn mid_block_flush_leaves_paragraph_unstyled() {
        let blocks = vec![SourceBlock::text(vec![
            SourceLine {
                spans: vec![PositionedSpan::new("An italic remark that precedes a heading", 10.0).italic()],
            },
            line("Introduction", 18.0),
            SourceLine {
                spans: vec![PositionedSpan::new("An aside in italics", 10.0).italic()],
            },
            line("that closes the block", 10.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\nAn italic remark that precedes a heading\n\n\n# Introduction\n\n*An aside in italics that closes the block*\n\n"
        );
    }

    #[test]
    fn heading_flushes_pending_caption_first() {
        let blocks = vec![SourceBlock::text(vec![
            line("Figure 4: Accuracy per fold", 9.0),
            line("Discussion", 18.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\n**Figure 4: Accuracy per fold**\n\n\n# Discussion\n\n"
        );
    }

    #[test]
    fn equation_flushes_pending_caption_first() {
        let blocks = vec![SourceBlock::text(vec![
            line("Table 1 Hyperparameters", 9.0),
            line("L = x + y (4)", 10.0),
        ])];

        let markdown = reconstructor().reconstruct_page(&blocks, 1);
        assert_eq!(
            markdown,
            "\n\n**Table 1 Hyperparameters**\n\n```\nL = x + y (4)\n```\n\n"
        );
    }

    #[test]
    fn page_markers_follow_option() {
        let reconstructor = PageReconstructor::new(true).expect("classifier should build");
        let markdown = reconstructor.reconstruct_page(&[], 4);
        assert_eq!(markdown, "\n\n---\n\n## Page 4\n\n");

        assert_eq!(fallback_page("  raw  ", 2, true), "\n\n## Page 2\n\nraw");
        assert_eq!(fallback_page("raw", 2, false), "\n\nraw");
        assert_eq!(fallback_page("   ", 2, true), "");
    }

    #[test]
    fn block_roles_survive_conversion() {
        let blocks = vec![
            SourceBlock::text(vec![
                line("Title of the Paper", 20.0),
                line("Body paragraph that wraps", 10.0),
                line("onto a second line.", 10.0),
                line("z = x + y (2)", 10.0),
                bold_line("Method", 12.0),
                line("Closing words.", 10.0),
            ]),
        ];

        let markdown = PageReconstructor::new(true)
            .expect("classifier should build")
            .reconstruct_page(&blocks, 1);
        let roles = to_blocks(&markdown)
            .iter()
            .map(|block| match block {
                ContentBlock::Heading { level, .. } => format!("h{level}"),
                ContentBlock::Paragraph { .. } => "p".to_string(),
                ContentBlock::Code { .. } => "code".to_string(),
                ContentBlock::Divider => "hr".to_string(),
                ContentBlock::Embed { .. } => "embed".to_string(),
            })
            .collect::<Vec<_>>();

        assert_eq!(roles, ["hr", "h2", "h1", "p", "code", "h2", "p"]);
    }
}
