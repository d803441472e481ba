//! Markdown-to-terminal rendering for assistant replies.

use crossterm::style::Stylize;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Convert a markdown body into styled terminal text.
///
/// Headings and strong text come out bold, emphasis italic, inline code and
/// code blocks yellow, list items as indented bullets. Anything the parser
/// does not recognize falls through as plain text. Pure function, no state.
pub fn render(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH);

    let mut out = String::new();
    let mut list_depth: usize = 0;
    let mut bold_depth: usize = 0;
    let mut italic_depth: usize = 0;
    let mut in_heading = false;
    let mut in_code_block = false;

    for event in parser {
        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => out.push_str("\n\n"),

            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                in_heading = false;
                out.push_str("\n\n");
            }

            Event::Start(Tag::List(_)) => list_depth += 1,
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                out.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                out.push_str("• ");
            }
            Event::End(TagEnd::Item) => out.push('\n'),

            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                out.push('\n');
            }

            Event::Start(Tag::Strong) => bold_depth += 1,
            Event::End(TagEnd::Strong) => bold_depth = bold_depth.saturating_sub(1),
            Event::Start(Tag::Emphasis) => italic_depth += 1,
            Event::End(TagEnd::Emphasis) => italic_depth = italic_depth.saturating_sub(1),

            Event::Text(text) => {
                let text = text.as_ref();
                let styled = if in_code_block {
                    text.yellow().to_string()
                } else if in_heading {
                    text.bold().to_string()
                } else if bold_depth > 0 && italic_depth > 0 {
                    text.bold().italic().to_string()
                } else if bold_depth > 0 {
                    text.bold().to_string()
                } else if italic_depth > 0 {
                    text.italic().to_string()
                } else {
                    text.to_string()
                };
                out.push_str(&styled);
            }
            Event::Code(code) => out.push_str(&code.as_ref().yellow().to_string()),

            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Rule => out.push_str("────────\n"),

            _ => {}
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("Sua média é 8,5."), "Sua média é 8,5.");
    }

    #[test]
    fn list_items_become_bullets() {
        let out = render("- Cálculo I\n- Física II");
        assert!(out.contains("• Cálculo I"));
        assert!(out.contains("• Física II"));
    }

    #[test]
    fn nested_lists_are_indented() {
        let out = render("- disciplinas\n  - Cálculo I");
        assert!(out.contains("• disciplinas"));
        assert!(out.contains("  • Cálculo I"));
    }

    #[test]
    fn inline_markup_keeps_the_text() {
        let out = render("nota **final**: `8.5`");
        assert!(out.contains("final"));
        assert!(out.contains("8.5"));
    }

    #[test]
    fn soft_breaks_join_lines() {
        let out = render("primeira\nsegunda");
        assert!(out.contains("primeira segunda"));
    }
}
