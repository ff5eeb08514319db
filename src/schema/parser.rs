//! Structural extraction of definitions, relations and permissions.
//!
//! This is a scanner, not a grammar: definition headers and declaration
//! heads are found with regexes over the masked source from
//! [`super::lexer`], and block extents come from counting brace tokens.
//! Comments and string literals therefore never open or close a block.
//! Malformed input degrades to partial output; nothing here errors.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::lexer::{self, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDecl {
    pub name: String,
    /// Allowed subject types, verbatim (`user | team#member`)
    #[serde(rename = "type")]
    pub subject_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecl {
    pub name: String,
    /// Right-hand side of the assignment, verbatim
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NamespaceInfo {
    pub name: String,
    pub relations: Vec<RelationDecl>,
    pub permissions: Vec<PermissionDecl>,
}

struct Patterns {
    definition: Regex,
    declaration: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                definition: Regex::new(r"\bdefinition\s+(\w+(?:/\w+)*)\s*\{").ok()?,
                declaration: Regex::new(r"\b(relation|permission)\s+(\w+)\s*([:=])").ok()?,
            })
        })
        .as_ref()
}

/// Parse schema text into one entry per definition, in order of first
/// appearance. A name defined twice keeps its first position and takes the
/// declarations of the last block.
pub fn parse_schema(src: &str) -> Vec<NamespaceInfo> {
    let Some(patterns) = patterns() else {
        return Vec::new();
    };
    let tokens = lexer::tokenize(src);
    let masked = lexer::mask(src, &tokens);

    let mut namespaces: Vec<NamespaceInfo> = Vec::new();
    for caps in patterns.definition.captures_iter(&masked) {
        let (Some(header), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_start = header.end();
        let body_end = block_end(&tokens, body_start).unwrap_or(src.len());

        let mut info = NamespaceInfo {
            name: name.as_str().to_string(),
            ..Default::default()
        };
        collect_declarations(src, &masked, body_start, body_end, patterns, &mut info);

        match namespaces.iter_mut().find(|ns| ns.name == info.name) {
            Some(existing) => {
                tracing::debug!(name = %info.name, "duplicate definition, keeping last body");
                *existing = info;
            }
            None => namespaces.push(info),
        }
    }
    namespaces
}

/// Offset of the brace closing the block whose `{` ends just before
/// `body_start`, or `None` if the block is never closed.
fn block_end(tokens: &[Token], body_start: usize) -> Option<usize> {
    let first = tokens.partition_point(|t| t.start < body_start);
    let mut depth = 1usize;
    for token in &tokens[first..] {
        match token.kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth -= 1;
                if depth == 0 {
                    return Some(token.start);
                }
            }
            _ => {}
        }
    }
    None
}

struct Head<'a> {
    keyword: &'a str,
    name: &'a str,
    separator: &'a str,
    start: usize,
    end: usize,
}

fn collect_declarations(
    src: &str,
    masked: &str,
    body_start: usize,
    body_end: usize,
    patterns: &Patterns,
    info: &mut NamespaceInfo,
) {
    let body = &masked[body_start..body_end];
    let heads: Vec<Head<'_>> = patterns
        .declaration
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Head {
                keyword: caps.get(1)?.as_str(),
                name: caps.get(2)?.as_str(),
                separator: caps.get(3)?.as_str(),
                start: body_start + whole.start(),
                end: body_start + whole.end(),
            })
        })
        .collect();

    for (i, head) in heads.iter().enumerate() {
        let line_end = masked[head.end..body_end]
            .find('\n')
            .map_or(body_end, |p| head.end + p);
        let value_end = match heads.get(i + 1) {
            Some(next) if next.start < line_end => next.start,
            _ => line_end,
        };
        let value = slice_value(src, masked, head.end, value_end);

        match (head.keyword, head.separator) {
            ("relation", ":") => info.relations.push(RelationDecl {
                name: head.name.to_string(),
                subject_type: value,
            }),
            ("permission", "=") => info.permissions.push(PermissionDecl {
                name: head.name.to_string(),
                expression: value,
            }),
            _ => {}
        }
    }
}

/// Trim using the mask so trailing comments fall away, then copy the
/// surviving range out of the original source.
fn slice_value(src: &str, masked: &str, start: usize, end: usize) -> String {
    let raw = &masked[start..end];
    let lead = raw.len() - raw.trim_start().len();
    let trail = raw.len() - raw.trim_end().len();
    if lead + trail >= raw.len() {
        return String::new();
    }
    src[start + lead..end - trail].trim().to_string()
}

/// Render namespaces as an indented tree, relations before permissions:
///
/// ```text
/// document
/// ├── relation owner: user
/// └── permission view = owner
/// ```
pub fn render_tree(namespaces: &[NamespaceInfo]) -> String {
    let mut blocks = Vec::with_capacity(namespaces.len());
    for ns in namespaces {
        let entries: Vec<String> = ns
            .relations
            .iter()
            .map(|r| format!("relation {}: {}", r.name, r.subject_type))
            .chain(
                ns.permissions
                    .iter()
                    .map(|p| format!("permission {} = {}", p.name, p.expression)),
            )
            .collect();

        let mut lines = vec![ns.name.clone()];
        for (i, entry) in entries.iter().enumerate() {
            let branch = if i + 1 == entries.len() {
                "└──"
            } else {
                "├──"
            };
            lines.push(format!("{branch} {entry}"));
        }
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n\n")
}
