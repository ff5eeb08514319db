//! Schema source to HTML markup.
//!
//! The lexer splits the source first: comments and string literals become
//! finished `hl-comment` / `hl-string` spans, everything else is escaped and
//! left plain. A fixed sequence of regex passes then wraps pieces of the plain
//! text in `<span class="hl-...">`. The text is kept as a list of segments; a
//! pass only rewrites plain segments, so markup produced earlier is never
//! matched again. Stripping the tags from the output yields the escaped
//! source.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::lexer::{tokenize, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Plain(String),
    Marked(String),
}

fn span(class: &str, text: &str) -> Segment {
    Segment::Marked(format!(r#"<span class="hl-{class}">{text}</span>"#))
}

fn plain(text: &str) -> Segment {
    Segment::Plain(text.to_string())
}

fn group<'a>(caps: &Captures<'a>, i: usize) -> &'a str {
    caps.get(i).map_or("", |m| m.as_str())
}

type Render = fn(&Captures<'_>) -> Vec<Segment>;

struct Pass {
    pattern: Regex,
    render: Render,
}

fn render_definition(caps: &Captures<'_>) -> Vec<Segment> {
    vec![
        span("keyword", group(caps, 1)),
        plain(group(caps, 2)),
        span("definition", group(caps, 3)),
    ]
}

fn render_relation(caps: &Captures<'_>) -> Vec<Segment> {
    vec![
        span("keyword", group(caps, 1)),
        plain(group(caps, 2)),
        span("relation", group(caps, 3)),
    ]
}

fn render_permission(caps: &Captures<'_>) -> Vec<Segment> {
    vec![
        span("keyword", group(caps, 1)),
        plain(group(caps, 2)),
        span("permission", group(caps, 3)),
    ]
}

fn render_keyword(caps: &Captures<'_>) -> Vec<Segment> {
    vec![span("keyword", group(caps, 0))]
}

fn render_operator(caps: &Captures<'_>) -> Vec<Segment> {
    match group(caps, 0) {
        // escaped angle brackets are text, not operators
        entity @ ("&lt;" | "&gt;") => vec![plain(entity)],
        op => vec![span("operator", op)],
    }
}

fn render_type(caps: &Captures<'_>) -> Vec<Segment> {
    vec![plain(group(caps, 1)), span("type", group(caps, 2))]
}

fn passes() -> &'static [Pass] {
    static PASSES: OnceLock<Vec<Pass>> = OnceLock::new();
    PASSES.get_or_init(|| {
        let table: [(&str, Render); 6] = [
            (r"\b(definition)(\s+)(\w+(?:/\w+)*)", render_definition),
            (r"\b(relation)(\s+)(\w+)", render_relation),
            (r"\b(permission)(\s+)(\w+)", render_permission),
            (
                r"\b(?:definition|relation|permission|caveat|with|nil|any|all|use|expiration)\b",
                render_keyword,
            ),
            (r"-&gt;|&amp;|&lt;|&gt;|[+\-|=#]", render_operator),
            (r"(:\s*)(\w+(?:/\w+)*)", render_type),
        ];
        table
            .into_iter()
            .filter_map(|(pattern, render)| match Regex::new(pattern) {
                Ok(pattern) => Some(Pass { pattern, render }),
                Err(e) => {
                    tracing::error!(error = %e, "invalid highlight pattern");
                    None
                }
            })
            .collect()
    })
}

fn escape(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for c in src.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn apply(segments: Vec<Segment>, pass: &Pass) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let text = match segment {
            Segment::Plain(text) => text,
            marked => {
                out.push(marked);
                continue;
            }
        };
        let mut last = 0;
        for caps in pass.pattern.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                out.push(plain(&text[last..whole.start()]));
            }
            out.extend((pass.render)(&caps));
            last = whole.end();
        }
        if last < text.len() {
            out.push(plain(&text[last..]));
        }
    }
    out
}

/// Escaped source with comments and strings already marked.
fn lexical_segments(src: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for token in tokenize(src) {
        let text = escape(token.text(src));
        match token.kind {
            TokenKind::Comment => segments.push(span("comment", &text)),
            TokenKind::Str => segments.push(span("string", &text)),
            _ => match segments.last_mut() {
                Some(Segment::Plain(run)) => run.push_str(&text),
                _ => segments.push(Segment::Plain(text)),
            },
        }
    }
    segments
}

/// Highlight schema source as HTML. Deterministic for a given input.
pub fn highlight(src: &str) -> String {
    let mut segments = lexical_segments(src);
    for pass in passes() {
        segments = apply(segments, pass);
    }
    segments
        .into_iter()
        .map(|s| match s {
            Segment::Plain(text) | Segment::Marked(text) => text,
        })
        .collect()
}
