//! Paragraph reassembly for body text.
//!
//! PDF text flow breaks lines wherever the layout wrapped them. Lines are
//! rejoined into one paragraph until the accumulated text ends with
//! sentence-terminal punctuation, at which point the next line opens a new
//! paragraph. Blank lines always close the current paragraph.

use crate::models::Line;

const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', ';', ':'];

pub fn clean_paragraph(raw: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in raw.split('\n') {
        let line = collapse_spaces(line);

        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() && !ends_sentence(&current) {
            current.push(' ');
            current.push_str(&line);
        } else {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            current = line;
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

/// Joins a body group and cleans it.
pub fn assemble_group(group: &[Line]) -> String {
    let raw = group
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    clean_paragraph(&raw)
}

/// [`assemble_group`] plus the first line's emphasis. Only the group that
/// closes a block is styled.
pub fn assemble_styled_group(group: &[Line]) -> String {
    let Some(first) = group.first() else {
        return String::new();
    };
    let cleaned = assemble_group(group);

    if cleaned.is_empty() {
        cleaned
    } else if first.is_italic {
        format!("*{cleaned}*")
    } else if first.is_bold {
        format!("**{cleaned}**")
    } else {
        cleaned
    }
}

pub fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|last| SENTENCE_TERMINATORS.contains(&last))
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_lines_are_rejoined() {
        let raw = "Deep networks learn\nrepresentations from\ndata.";
        assert_eq!(
            clean_paragraph(raw),
            "Deep networks learn representations from data."
        );
    }

    #[test]
    fn terminal_punctuation_closes_paragraph() {
        let raw = "First sentence.\nSecond starts here\nand ends here!\nThird: \nfourth";
        assert_eq!(
            clean_paragraph(raw),
            "First sentence.\n\nSecond starts here and ends here!\n\nThird:\n\nfourth"
        );
    }

    #[test]
    fn blank_lines_close_paragraph_without_punctuation() {
        let raw = "no stop here\n\n   \nnext block";
        assert_eq!(clean_paragraph(raw), "no stop here\n\nnext block");
    }

    #[test]
    fn inner_whitespace_is_collapsed() {
        assert_eq!(clean_paragraph("  a \t  b   "), "a b");
        assert_eq!(clean_paragraph(""), "");
        assert_eq!(clean_paragraph("\n\n"), "");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let samples = [
            "one\ntwo.\nthree;\n\nfour",
            "a.\n\n\nb\nc\n",
            "  spaced   out \n text ",
            "no punctuation at all\nstill going\n\nnew",
            "",
            "x:\n\ny",
        ];
        for sample in samples {
            let once = clean_paragraph(sample);
            assert_eq!(clean_paragraph(&once), once, "{sample:?}");
        }
    }

    #[test]
    fn first_line_style_wraps_group() {
        let italic = vec![
            Line::new("Quoted remark", 10.0).italic(),
            Line::new("continues.", 10.0).bold(),
        ];
        assert_eq!(assemble_styled_group(&italic), "*Quoted remark continues.*");

        let bold = vec![Line::new("Note", 10.0).bold(), Line::new("this.", 10.0)];
        assert_eq!(assemble_styled_group(&bold), "**Note this.**");

        let plain = vec![Line::new("plain", 10.0), Line::new("text", 10.0).italic()];
        assert_eq!(assemble_styled_group(&plain), "plain text");

        assert_eq!(assemble_styled_group(&[]), "");
    }

    #[test]
    fn unstyled_assembly_ignores_emphasis() {
        let italic = vec![
            Line::new("Quoted remark", 10.0).italic(),
            Line::new("continues.", 10.0),
        ];
        assert_eq!(assemble_group(&italic), "Quoted remark continues.");
        assert_eq!(assemble_group(&[]), "");
    }
}
