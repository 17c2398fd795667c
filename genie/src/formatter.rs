//! Turns assistant text into display nodes: paragraphs, bullet lists and
//! bold spans. Everything here is pure and recomputed on each render.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Emphasis(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayNode {
    Paragraph(Vec<Span>),
    BulletList(Vec<Vec<Span>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Bullet(&'a str),
    Text(&'a str),
}

fn bullet_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\* (.+)").unwrap())
}

fn emphasis_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*[^*]+\*\*").unwrap())
}

/// Classifies an already trimmed line. `**bold**` is not a bullet: the
/// character after the first `*` has to be a space.
pub fn classify_line(line: &str) -> LineKind<'_> {
    match bullet_pattern().captures(line).and_then(|c| c.get(1)) {
        Some(item) => LineKind::Bullet(item.as_str()),
        None => LineKind::Text(line),
    }
}

/// Splits text into plain and emphasized spans on `**...**`.
pub fn tokenize_emphasis(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for m in emphasis_pattern().find_iter(text) {
        if m.start() > last {
            spans.push(Span::Plain(text[last..m.start()].to_string()));
        }
        let inner = &m.as_str()[2..m.as_str().len() - 2];
        spans.push(Span::Emphasis(inner.to_string()));
        last = m.end();
    }

    if last < text.len() {
        spans.push(Span::Plain(text[last..].to_string()));
    }

    spans
}

pub fn format(content: &str) -> Vec<DisplayNode> {
    let mut nodes = Vec::new();
    let mut bullets: Vec<Vec<Span>> = Vec::new();

    for line in content.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match classify_line(line) {
            LineKind::Bullet(item) => bullets.push(tokenize_emphasis(item)),
            LineKind::Text(text) => {
                if !bullets.is_empty() {
                    nodes.push(DisplayNode::BulletList(std::mem::take(&mut bullets)));
                }
                nodes.push(DisplayNode::Paragraph(tokenize_emphasis(text)));
            }
        }
    }

    if !bullets.is_empty() {
        nodes.push(DisplayNode::BulletList(bullets));
    }

    nodes
}

fn render_spans(spans: &[Span], ansi: bool, out: &mut String) {
    for span in spans {
        match span {
            Span::Plain(text) => out.push_str(text),
            Span::Emphasis(text) if ansi => {
                out.push_str("\x1b[1;31m");
                out.push_str(text);
                out.push_str("\x1b[0m");
            }
            Span::Emphasis(text) => out.push_str(text),
        }
    }
}

/// Renders nodes for a terminal, one line per paragraph or bullet item.
pub fn render_plain(nodes: &[DisplayNode], ansi: bool) -> String {
    let mut out = String::new();

    for node in nodes {
        match node {
            DisplayNode::Paragraph(spans) => {
                render_spans(spans, ansi, &mut out);
                out.push('\n');
            }
            DisplayNode::BulletList(items) => {
                for item in items {
                    out.push_str("  • ");
                    render_spans(item, ansi, &mut out);
                    out.push('\n');
                }
            }
        }
    }

    out
}
