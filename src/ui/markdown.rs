//! Lightweight inline formatting for message text.
//!
//! Each line is scanned three times: inline code first, then `**bold**` in
//! the remaining text, then `*italic*` in what is left. Delimited runs must
//! be non-empty and may not contain their delimiter character. Nothing else
//! (headings, lists, links) is interpreted.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineStyles {
    pub base: Style,
    pub code: Style,
    pub bold: Style,
    pub italic: Style,
}

impl InlineStyles {
    pub fn with_base(base: Style) -> Self {
        Self {
            base,
            code: base.fg(Color::LightBlue),
            bold: base.add_modifier(Modifier::BOLD),
            italic: base.add_modifier(Modifier::ITALIC),
        }
    }
}

impl Default for InlineStyles {
    fn default() -> Self {
        Self::with_base(Style::default())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Plain(&'a str),
    Marked(&'a str),
}

fn split_delimited<'a>(text: &'a str, delim: &str, stop: char) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i < text.len() {
        if text[i..].starts_with(delim) {
            let inner_start = i + delim.len();
            if let Some(rel) = text[inner_start..].find(stop) {
                let inner_end = inner_start + rel;
                if rel > 0 && text[inner_end..].starts_with(delim) {
                    if plain_start < i {
                        segments.push(Segment::Plain(&text[plain_start..i]));
                    }
                    segments.push(Segment::Marked(&text[inner_start..inner_end]));
                    i = inner_end + delim.len();
                    plain_start = i;
                    continue;
                }
            }
        }
        i += text[i..].chars().next().map_or(1, char::len_utf8);
    }

    if plain_start < text.len() {
        segments.push(Segment::Plain(&text[plain_start..]));
    }
    segments
}

fn push_emphasis(spans: &mut Vec<Span<'static>>, text: &str, styles: &InlineStyles) {
    for bold in split_delimited(text, "**", '*') {
        match bold {
            Segment::Marked(inner) => spans.push(Span::styled(inner.to_string(), styles.bold)),
            Segment::Plain(rest) => {
                for italic in split_delimited(rest, "*", '*') {
                    match italic {
                        Segment::Marked(inner) => {
                            spans.push(Span::styled(inner.to_string(), styles.italic))
                        }
                        Segment::Plain(plain) => {
                            spans.push(Span::styled(plain.to_string(), styles.base))
                        }
                    }
                }
            }
        }
    }
}

/// Format one line of text (no newlines) into styled spans.
pub fn format_line(line: &str, styles: &InlineStyles) -> Line<'static> {
    let mut spans = Vec::new();
    for segment in split_delimited(line, "`", '`') {
        match segment {
            Segment::Marked(code) => spans.push(Span::styled(code.to_string(), styles.code)),
            Segment::Plain(text) => push_emphasis(&mut spans, text, styles),
        }
    }
    Line::from(spans)
}

/// Format message content, one `Line` per newline-separated line.
pub fn format_content(text: &str, styles: &InlineStyles) -> Vec<Line<'static>> {
    text.split('\n')
        .map(|line| format_line(line, styles))
        .collect()
}
