//! Minimal lexer for SpiceDB schema source.
//!
//! Only the regions that matter for structural scanning are classified:
//! comments, string literals and braces. Everything else is `Text`. Token
//! spans are byte offsets into the source and always fall on char
//! boundaries because every delimiter is ASCII.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `// ...` up to (not including) the newline, or `/* ... */`
    Comment,
    /// `"..."` or `'...'` including the quotes
    Str,
    LBrace,
    RBrace,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// Split `src` into tokens covering every byte exactly once.
/// Unterminated comments and strings run to end of input.
pub fn tokenize(src: &str) -> Vec<Token> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut text_start: Option<usize> = None;
    let mut i = 0;

    let flush = |tokens: &mut Vec<Token>, text_start: &mut Option<usize>, at: usize| {
        if let Some(start) = text_start.take() {
            tokens.push(Token {
                kind: TokenKind::Text,
                start,
                end: at,
            });
        }
    };

    while i < len {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            b'/' if next == Some(b'/') => {
                flush(&mut tokens, &mut text_start, i);
                let end = src[i..].find('\n').map_or(len, |p| i + p);
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    start: i,
                    end,
                });
                i = end;
            }
            b'/' if next == Some(b'*') => {
                flush(&mut tokens, &mut text_start, i);
                let end = src[i + 2..].find("*/").map_or(len, |p| i + 2 + p + 2);
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    start: i,
                    end,
                });
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                flush(&mut tokens, &mut text_start, i);
                let mut j = i + 1;
                while j < len {
                    match bytes[j] {
                        b'\\' => j += 2,
                        b if b == quote => {
                            j += 1;
                            break;
                        }
                        _ => j += 1,
                    }
                }
                let end = j.min(len);
                tokens.push(Token {
                    kind: TokenKind::Str,
                    start: i,
                    end,
                });
                i = end;
            }
            b'{' => {
                flush(&mut tokens, &mut text_start, i);
                tokens.push(Token {
                    kind: TokenKind::LBrace,
                    start: i,
                    end: i + 1,
                });
                i += 1;
            }
            b'}' => {
                flush(&mut tokens, &mut text_start, i);
                tokens.push(Token {
                    kind: TokenKind::RBrace,
                    start: i,
                    end: i + 1,
                });
                i += 1;
            }
            _ => {
                text_start.get_or_insert(i);
                i += 1;
            }
        }
    }
    flush(&mut tokens, &mut text_start, len);
    tokens
}

/// Copy of `src` with comment bodies and string interiors blanked to
/// spaces. Newlines survive and every byte keeps its offset, so matches
/// found in the mask slice straight back into the source. String quotes are
/// kept so a trimmed range never loses a literal entirely.
pub fn mask(src: &str, tokens: &[Token]) -> String {
    let mut out = String::with_capacity(src.len());
    for token in tokens {
        let text = token.text(src);
        match token.kind {
            TokenKind::Comment => blank(&mut out, text),
            TokenKind::Str => {
                let quote = &text[..1];
                out.push_str(quote);
                let inner = &text[1..];
                match inner.strip_suffix(quote) {
                    Some(body) => {
                        blank(&mut out, body);
                        out.push_str(quote);
                    }
                    None => blank(&mut out, inner),
                }
            }
            _ => out.push_str(text),
        }
    }
    out
}

fn blank(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    }
}
