//! Splits a command line into argument tokens.
//!
//! A token is a run of non-whitespace, non-quote characters, or the content
//! of a double-quoted span with the quotes removed. An unterminated quote
//! runs to end of input. Tokenizing never fails.

use crate::terminal::CommandError;

/// Characters that would let a payload escape into a shell.
pub const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '>', '<', '`', '$'];

pub fn split(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => {
                i += 1;
            }
            '"' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
                i += 1; // skip closing quote (or step past end)
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '"' {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            }
        }
    }
    tokens
}

/// Like [`split`], but first rejects the whole line if the raw text contains
/// any shell metacharacter, quoted or not.
pub fn split_hardened(input: &str) -> Result<Vec<String>, CommandError> {
    if let Some(c) = input.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(CommandError::DisallowedCharacter(c));
    }
    Ok(split(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_and_quoted() {
        let tokens = split(r#"zed permission check "doc:a b" view user:alice"#);
        assert_eq!(
            tokens,
            vec!["zed", "permission", "check", "doc:a b", "view", "user:alice"]
        );
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(split(r#"zed "abc"#), vec!["zed", "abc"]);
        assert_eq!(split(r#"zed "a b  "#), vec!["zed", "a b  "]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split("").is_empty());
        assert!(split("   \t ").is_empty());
    }

    #[test]
    fn test_empty_quotes_yield_empty_token() {
        assert_eq!(split(r#"a "" b"#), vec!["a", "", "b"]);
    }

    #[test]
    fn test_quote_splits_adjacent_run() {
        // a quote ends the unquoted run it touches
        assert_eq!(split(r#"ab"c d"e"#), vec!["ab", "c d", "e"]);
    }

    #[test]
    fn test_hardened_rejects_every_metacharacter() {
        for c in SHELL_METACHARACTERS {
            let line = format!("zed schema read {c} rm -rf /");
            let err = split_hardened(&line).unwrap_err();
            assert!(matches!(err, CommandError::DisallowedCharacter(found) if found == *c));
        }
    }

    #[test]
    fn test_hardened_rejects_inside_quotes() {
        let err = split_hardened(r#"zed permission check "doc:$(id)" view user:a"#).unwrap_err();
        assert!(matches!(err, CommandError::DisallowedCharacter('$')));
    }

    #[test]
    fn test_hardened_accepts_clean_line() {
        let tokens = split_hardened("zed relationship read --resource-type document").unwrap();
        assert_eq!(tokens.len(), 5);
    }
}
