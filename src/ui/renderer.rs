//! Line-oriented terminal output.

use std::io::{self, Write};

use chrono::{Local, TimeZone};
use memchr::memchr;
use ratatui::crossterm::style::{self as term, Attribute, PrintStyledContent, Stylize};
use ratatui::crossterm::QueueableCommand;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;

use crate::core::message::{Message, Role};
use crate::core::thread::Thread;
use crate::ui::markdown::{format_content, format_line, InlineStyles};

pub const USER_LABEL: &str = "You";
pub const MODEL_LABEL: &str = "Gemini";

fn to_term_color(color: Color) -> term::Color {
    match color {
        Color::Reset => term::Color::Reset,
        Color::Black => term::Color::Black,
        Color::Red => term::Color::DarkRed,
        Color::Green => term::Color::DarkGreen,
        Color::Yellow => term::Color::DarkYellow,
        Color::Blue => term::Color::DarkBlue,
        Color::Magenta => term::Color::DarkMagenta,
        Color::Cyan => term::Color::DarkCyan,
        Color::Gray => term::Color::Grey,
        Color::DarkGray => term::Color::DarkGrey,
        Color::LightRed => term::Color::Red,
        Color::LightGreen => term::Color::Green,
        Color::LightYellow => term::Color::Yellow,
        Color::LightBlue => term::Color::Blue,
        Color::LightMagenta => term::Color::Magenta,
        Color::LightCyan => term::Color::Cyan,
        Color::White => term::Color::White,
        Color::Rgb(r, g, b) => term::Color::Rgb { r, g, b },
        Color::Indexed(i) => term::Color::AnsiValue(i),
    }
}

/// Writes styled lines to a terminal, or plain text when `color` is off.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub markdown: bool,
    pub color: bool,
}

impl Renderer {
    pub fn new(markdown: bool, color: bool) -> Self {
        Self { markdown, color }
    }

    pub fn write_line<W: Write + ?Sized>(&self, out: &mut W, line: &Line<'_>) -> io::Result<()> {
        for span in &line.spans {
            if !self.color || span.style == Style::default() {
                write!(out, "{}", span.content)?;
                continue;
            }
            let mut styled = term::style(&*span.content);
            if let Some(fg) = span.style.fg {
                styled = styled.with(to_term_color(fg));
            }
            if span.style.add_modifier.contains(Modifier::BOLD) {
                styled = styled.attribute(Attribute::Bold);
            }
            if span.style.add_modifier.contains(Modifier::ITALIC) {
                styled = styled.attribute(Attribute::Italic);
            }
            if span.style.add_modifier.contains(Modifier::DIM) {
                styled = styled.attribute(Attribute::Dim);
            }
            out.queue(PrintStyledContent(styled))?;
        }
        writeln!(out)
    }

    fn content_lines(&self, content: &str, styles: &InlineStyles) -> Vec<Line<'static>> {
        if self.markdown {
            format_content(content, styles)
        } else {
            content
                .split('\n')
                .map(|line| Line::styled(line.to_string(), styles.base))
                .collect()
        }
    }

    pub fn write_message<W: Write + ?Sized>(
        &self,
        out: &mut W,
        message: &Message,
    ) -> io::Result<()> {
        self.write_line(out, &message_header(message.role, message.timestamp))?;
        let styles = InlineStyles::with_base(body_style(message.role));
        for line in self.content_lines(&message.content, &styles) {
            self.write_line(out, &line)?;
        }
        writeln!(out)
    }

    pub fn write_transcript<W: Write + ?Sized>(
        &self,
        out: &mut W,
        thread: &Thread,
    ) -> io::Result<()> {
        self.write_line(
            out,
            &Line::styled(
                format!("── {} ──", thread.title),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        )?;
        if thread.messages.is_empty() {
            self.write_line(out, &notice_line("(no messages yet)"))?;
        }
        for message in &thread.messages {
            self.write_message(out, message)?;
        }
        Ok(())
    }

    /// Numbered list, most recent first, with the active thread marked.
    pub fn write_thread_list<W: Write + ?Sized>(
        &self,
        out: &mut W,
        threads: &[Thread],
        active_id: Option<&str>,
    ) -> io::Result<()> {
        if threads.is_empty() {
            return self.write_line(out, &notice_line("No saved threads."));
        }
        for (index, thread) in threads.iter().enumerate() {
            let is_active = active_id == Some(thread.id.as_str());
            let marker = if is_active { "*" } else { " " };
            let count = thread.messages.len();
            let noun = if count == 1 { "message" } else { "messages" };
            let text = format!(
                "{marker} {:>2}. {} ({count} {noun}, {})",
                index + 1,
                thread.title,
                format_clock(thread.updated_at)
            );
            let style = if is_active {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            self.write_line(out, &Line::styled(text, style))?;
        }
        Ok(())
    }

    pub fn write_notice<W: Write + ?Sized>(&self, out: &mut W, text: &str) -> io::Result<()> {
        self.write_line(out, &notice_line(text))
    }
}

fn notice_line(text: &str) -> Line<'static> {
    Line::styled(text.to_string(), Style::default().fg(Color::DarkGray))
}

fn body_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Cyan),
        Role::Model => Style::default(),
    }
}

pub fn label(role: Role) -> &'static str {
    match role {
        Role::User => USER_LABEL,
        Role::Model => MODEL_LABEL,
    }
}

pub fn message_header(role: Role, timestamp: i64) -> Line<'static> {
    let color = match role {
        Role::User => Color::Cyan,
        Role::Model => Color::LightBlue,
    };
    Line::styled(
        format!("{} · {}", label(role), format_clock(timestamp)),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

/// Local `HH:MM` for an epoch-millisecond timestamp.
pub fn format_clock(timestamp_millis: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_millis).single() {
        Some(time) => time.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Prints a reply as fragments arrive.
///
/// With markdown on, only complete lines are formatted and printed; the
/// trailing partial line waits for its newline or for [`finish`].
///
/// [`finish`]: StreamingPrinter::finish
pub struct StreamingPrinter {
    renderer: Renderer,
    styles: InlineStyles,
    pending: String,
}

impl StreamingPrinter {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            styles: InlineStyles::with_base(body_style(Role::Model)),
            pending: String::new(),
        }
    }

    pub fn push<W: Write + ?Sized>(&mut self, out: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        if !self.renderer.markdown {
            write!(out, "{fragment}")?;
            self.pending.push_str(fragment);
            if let Some(pos) = self.pending.rfind('\n') {
                self.pending.drain(..=pos);
            }
            return out.flush();
        }

        self.pending.push_str(fragment);
        while let Some(pos) = memchr(b'\n', self.pending.as_bytes()) {
            let line: String = self.pending.drain(..=pos).collect();
            let line = format_line(line.trim_end_matches('\n'), &self.styles);
            self.renderer.write_line(out, &line)?;
        }
        out.flush()
    }

    /// Print whatever is left and end the line.
    pub fn finish<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        if self.renderer.markdown {
            if !self.pending.is_empty() {
                let line = format_line(&self.pending, &self.styles);
                self.renderer.write_line(out, &line)?;
            }
        } else if !self.pending.is_empty() {
            writeln!(out)?;
        }
        self.pending.clear();
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(markdown: bool) -> Renderer {
        Renderer::new(markdown, false)
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn plain_renderer_strips_styling() {
        let mut buf = Vec::new();
        let line = format_line("a **b** `c`", &InlineStyles::default());
        plain(true).write_line(&mut buf, &line).expect("write");
        assert_eq!(output(buf), "a b c\n");
    }

    #[test]
    fn color_renderer_emits_escape_sequences() {
        let mut buf = Vec::new();
        let line = format_line("**b**", &InlineStyles::default());
        Renderer::new(true, true)
            .write_line(&mut buf, &line)
            .expect("write");
        let text = output(buf);
        assert!(text.contains('\u{1b}'));
        assert!(text.contains('b'));
    }

    #[test]
    fn message_uses_role_label() {
        let mut buf = Vec::new();
        let message = Message::model("m1", "*hi*");
        plain(true).write_message(&mut buf, &message).expect("write");
        let text = output(buf);
        assert!(text.starts_with("Gemini · "));
        assert!(text.contains("\nhi\n"));
    }

    #[test]
    fn markdown_off_keeps_markers() {
        let mut buf = Vec::new();
        let message = Message::user("**raw**");
        plain(false).write_message(&mut buf, &message).expect("write");
        let text = output(buf);
        assert!(text.starts_with("You · "));
        assert!(text.contains("**raw**"));
    }

    #[test]
    fn clock_is_hours_and_minutes() {
        let formatted = format_clock(0);
        assert_eq!(formatted.len(), 5);
        assert_eq!(&formatted[2..3], ":");
    }

    #[test]
    fn thread_list_marks_active() {
        let mut first = Thread::new();
        first.title = "First".to_string();
        let mut second = Thread::new();
        second.title = "Second".to_string();
        let active = second.id.clone();

        let mut buf = Vec::new();
        plain(true)
            .write_thread_list(&mut buf, &[first, second], Some(&active))
            .expect("write");
        let text = output(buf);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("   1. First (0 messages"));
        assert!(lines[1].starts_with("*  2. Second"));
    }

    #[test]
    fn streaming_printer_renders_complete_lines() {
        let mut printer = StreamingPrinter::new(plain(true));
        let mut buf = Vec::new();

        printer.push(&mut buf, "one **bo").expect("push");
        assert!(buf.is_empty());
        printer.push(&mut buf, "ld**\ntw").expect("push");
        assert_eq!(output(buf.clone()), "one bold\n");
        printer.push(&mut buf, "o").expect("push");
        printer.finish(&mut buf).expect("finish");

        assert_eq!(output(buf), "one bold\ntwo\n");
    }

    #[test]
    fn streaming_printer_passes_raw_fragments_through() {
        let mut printer = StreamingPrinter::new(plain(false));
        let mut buf = Vec::new();
        printer.push(&mut buf, "a *b").expect("push");
        printer.push(&mut buf, "*\nc").expect("push");
        printer.finish(&mut buf).expect("finish");
        assert_eq!(output(buf), "a *b*\nc\n");
    }

    #[test]
    fn streaming_printer_finish_without_output() {
        let mut printer = StreamingPrinter::new(plain(false));
        let mut buf = Vec::new();
        printer.finish(&mut buf).expect("finish");
        assert!(buf.is_empty());
    }
}
