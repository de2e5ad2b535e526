//! Balanced foreign-block extraction.
//!
//! Every `@cpp { ... }` block is cut out of the source before tokenization,
//! since its contents follow C++ rules rather than ours. The block is
//! replaced by a `__BLOCK_n__` placeholder followed by as many line breaks as
//! the block spanned, so positions of later tokens stay accurate.

use tracing::trace;

use super::{position_at, LexError};

const PLACEHOLDER_PREFIX: &str = "__BLOCK_";
const PLACEHOLDER_SUFFIX: &str = "__";

pub fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}{PLACEHOLDER_SUFFIX}")
}

/// Parses `__BLOCK_n__` back into `n`.
pub fn placeholder_index(text: &str) -> Option<u32> {
    text.strip_prefix(PLACEHOLDER_PREFIX)?
        .strip_suffix(PLACEHOLDER_SUFFIX)?
        .parse()
        .ok()
}

pub fn extract(src: &str, marker: &str) -> Result<(String, Vec<String>), LexError> {
    let mut out = String::with_capacity(src.len());
    let mut blocks = Vec::new();
    let mut i = 0;

    while let Some(found) = src[i..].find(marker) {
        let start = i + found;
        let after_marker = start + marker.len();
        out.push_str(&src[i..start]);

        // `@cppx` is some other annotation.
        let bounded = !src[after_marker..].starts_with(|c: char| c.is_alphanumeric() || c == '_');
        let open = after_marker + (src[after_marker..].len() - src[after_marker..].trim_start().len());
        if !bounded || !src[open..].starts_with('{') {
            out.push_str(marker);
            i = after_marker;
            continue;
        }

        let Some(close) = find_closing_brace(src, open) else {
            return Err(LexError::UnbalancedBlock {
                pos: position_at(src, start),
            });
        };

        let index = blocks.len();
        trace!(index, lo = start, hi = close + 1, "extracted foreign block");
        blocks.push(src[open + 1..close].to_owned());
        out.push_str(&placeholder(index));
        let spanned_lines = src[start..=close].matches('\n').count();
        out.extend(std::iter::repeat('\n').take(spanned_lines));
        i = close + 1;
    }
    out.push_str(&src[i..]);

    Ok((out, blocks))
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mode {
    Plain,
    LineComment,
    BlockComment,
    Quoted(char),
}

/// Byte offset of the brace closing the one at `open`. Braces inside
/// strings, character literals and comments are ignored.
fn find_closing_brace(src: &str, open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut mode = Mode::Plain;
    let mut escaped = false;
    let mut chars = src[open..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);
        match mode {
            Mode::LineComment => {
                if c == '\n' {
                    mode = Mode::Plain;
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    chars.next();
                    mode = Mode::Plain;
                }
            }
            Mode::Quoted(quote) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    mode = Mode::Plain;
                }
            }
            Mode::Plain => match (c, next) {
                ('/', Some('/')) => {
                    chars.next();
                    mode = Mode::LineComment;
                }
                ('/', Some('*')) => {
                    chars.next();
                    mode = Mode::BlockComment;
                }
                ('"' | '\'', _) => mode = Mode::Quoted(c),
                ('{', _) => depth += 1,
                ('}', _) => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + offset);
                    }
                }
                _ => (),
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_nested_braces() {
        let src = "a\n@cpp {\n    if (x) { y(); }\n}\nb";
        let (out, blocks) = extract(src, "@cpp").unwrap();
        assert_eq!(out, "a\n__BLOCK_0__\n\n\nb");
        assert_eq!(blocks, ["\n    if (x) { y(); }\n"]);
    }

    #[test]
    fn test_braces_in_strings_and_comments_are_ignored() {
        let src = r#"@cpp { auto s = "}"; char c = '{'; // }
/* { */ }"#;
        let (out, blocks) = extract(src, "@cpp").unwrap();
        assert_eq!(out, "__BLOCK_0__\n");
        assert_eq!(blocks, [" auto s = \"}\"; char c = '{'; // }\n/* { */ "]);
    }

    #[test]
    fn test_escaped_quotes() {
        let src = r#"@cpp{ puts("\"}\""); } rest"#;
        let (out, blocks) = extract(src, "@cpp").unwrap();
        assert_eq!(out, "__BLOCK_0__ rest");
        assert_eq!(blocks, [r#" puts("\"}\""); "#]);
    }

    #[test]
    fn test_marker_without_block() {
        let (out, blocks) = extract("@cpp x @cppfoo { }", "@cpp").unwrap();
        assert_eq!(out, "@cpp x @cppfoo { }");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_multiple_blocks() {
        let (out, blocks) = extract("@cpp {a} @cpp {b}", "@cpp").unwrap();
        assert_eq!(out, "__BLOCK_0__ __BLOCK_1__");
        assert_eq!(blocks, ["a", "b"]);
    }

    #[test]
    fn test_unbalanced() {
        let error = extract("x\n  @cpp { {", "@cpp").unwrap_err();
        assert_eq!(
            error,
            LexError::UnbalancedBlock {
                pos: crate::token::Position::new(2, 3)
            }
        );
    }

    #[test]
    fn test_placeholder_index() {
        assert_eq!(placeholder_index(&placeholder(12)), Some(12));
        assert_eq!(placeholder_index("__BLOCK_x__"), None);
        assert_eq!(placeholder_index("BLOCK_1"), None);
    }
}
