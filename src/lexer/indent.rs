//! Indentation-sensitive layout.
//!
//! Comments are blanked out first (`#` and `//` line comments, `##` and
//! nestable `/* */` block comments), then the text is scanned by the regular
//! lexer and the layout tokens are spliced in: a [`TokenKind::Newline`] after
//! every logical line, [`TokenKind::Indent`] when a line is indented deeper
//! than the enclosing one and one [`TokenKind::Dedent`] per closed level.
//! Lines inside open brackets continue the current logical line.

use tracing::trace;

use super::{position_at, Config, LexError};
use crate::token::{Position, Span, Token, TokenKind};

pub fn lex(src: &str, block_count: usize, tokens: &mut Vec<Token>) -> Result<(), LexError> {
    let stripped = strip_comments(src)?;
    let mut raw = Vec::with_capacity(tokens.capacity());
    super::lex(&stripped, &Config::default(), block_count, &mut raw)?;
    layout(raw, tokens)
}

fn layout(raw: Vec<Token>, tokens: &mut Vec<Token>) -> Result<(), LexError> {
    let mut stack = vec![0_usize];
    let mut depth = 0_usize;
    let mut last_line = 0;
    let mut line_open = false;
    let mut end = (Position::default(), Span::default());

    for token in raw {
        if token.is_eof() {
            if line_open {
                tokens.push(layout_token(TokenKind::Newline, end));
            }
            let eof = (token.pos(), token.span);
            while stack.len() > 1 {
                stack.pop();
                tokens.push(layout_token(TokenKind::Dedent, eof));
            }
            tokens.push(token);
            return Ok(());
        }

        if token.line != last_line && depth == 0 {
            if line_open {
                tokens.push(layout_token(TokenKind::Newline, end));
            }
            let width = token.column as usize - 1;
            indentation(width, &token, &mut stack, tokens)?;
            line_open = true;
        }

        match token.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                depth = depth.saturating_sub(1);
            }
            _ => (),
        }

        // Raw strings may span lines; the next line starts after them.
        let spanned = u32::try_from(token.text.matches('\n').count()).unwrap_or(0);
        last_line = token.line + spanned;
        end = (token.pos(), Span::new_of_length(token.span.hi(), 0));
        tokens.push(token);
    }

    // The scanner always ends with `Eof`.
    Ok(())
}

fn indentation(
    width: usize,
    token: &Token,
    stack: &mut Vec<usize>,
    tokens: &mut Vec<Token>,
) -> Result<(), LexError> {
    let top = stack.last().copied().unwrap_or_default();
    let at = (token.pos(), Span::new_of_length(token.span.lo, 0));
    if width > top {
        trace!(width, line = token.line, "indent");
        stack.push(width);
        tokens.push(layout_token(TokenKind::Indent, at));
    } else if width < top {
        while stack.last().is_some_and(|&level| level > width) {
            stack.pop();
            tokens.push(layout_token(TokenKind::Dedent, at));
        }
        if stack.last() != Some(&width) {
            return Err(LexError::InconsistentIndent {
                width,
                pos: token.pos(),
            });
        }
    }
    Ok(())
}

fn layout_token(kind: TokenKind, (pos, span): (Position, Span)) -> Token {
    Token::new(kind, String::new(), pos, span)
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mode {
    Code,
    Quoted(char),
    LineComment,
    /// Nesting depth of `/* */`.
    Block(usize),
    /// Between `##` markers.
    HashBlock,
}

/// Replaces every comment character with a space, keeping line breaks so
/// positions are preserved. Quote-aware, so `#` and `//` inside literals
/// survive.
fn strip_comments(src: &str) -> Result<String, LexError> {
    let mut out = String::with_capacity(src.len());
    let mut mode = Mode::Code;
    let mut escaped = false;
    let mut opened_at = 0;
    let mut chars = src.char_indices().peekable();

    let blank = |out: &mut String, c: char| out.push(if c == '\n' { '\n' } else { ' ' });

    while let Some((offset, c)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);
        match mode {
            Mode::Code => match (c, next) {
                ('#', Some('#')) => {
                    chars.next();
                    out.push_str("  ");
                    mode = Mode::HashBlock;
                    opened_at = offset;
                }
                ('#', _) => {
                    out.push(' ');
                    mode = Mode::LineComment;
                }
                ('/', Some('/')) => {
                    chars.next();
                    out.push_str("  ");
                    mode = Mode::LineComment;
                }
                ('/', Some('*')) => {
                    chars.next();
                    out.push_str("  ");
                    mode = Mode::Block(1);
                    opened_at = offset;
                }
                ('"' | '\'', _) => {
                    out.push(c);
                    mode = Mode::Quoted(c);
                }
                _ => out.push(c),
            },
            Mode::Quoted(quote) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote || c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::LineComment => {
                blank(&mut out, c);
                if c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::Block(depth) => match (c, next) {
                ('/', Some('*')) => {
                    chars.next();
                    out.push_str("  ");
                    mode = Mode::Block(depth + 1);
                }
                ('*', Some('/')) => {
                    chars.next();
                    out.push_str("  ");
                    mode = if depth == 1 {
                        Mode::Code
                    } else {
                        Mode::Block(depth - 1)
                    };
                }
                _ => blank(&mut out, c),
            },
            Mode::HashBlock => match (c, next) {
                ('#', Some('#')) => {
                    chars.next();
                    out.push_str("  ");
                    mode = Mode::Code;
                }
                _ => blank(&mut out, c),
            },
        }
    }

    if matches!(mode, Mode::Block(_) | Mode::HashBlock) {
        return Err(LexError::Unterminated {
            literal: "block comment",
            pos: position_at(src, opened_at),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_indented;
    use pretty_assertions::assert_eq;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, _) = tokenize_indented(src).expect("failed to lex");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_indent_and_dedent() {
        let src = "if x:\n    a\n    if y:\n        b\nc\n";
        assert_eq!(
            kinds(src),
            [
                If, Ident, Colon, Newline, //
                Indent, Ident, Newline, //
                If, Ident, Colon, Newline, //
                Indent, Ident, Newline, //
                Dedent, Dedent, Ident, Newline, //
                Eof,
            ]
        );
    }

    #[test]
    fn test_final_dedents() {
        let src = "main:\n  a\n    b";
        assert_eq!(
            kinds(src),
            [Main, Colon, Newline, Indent, Ident, Newline, Indent, Ident, Newline, Dedent, Dedent, Eof]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        let src = "a\n\n    # only a comment\n  // another\nb ## inline ## c\n## spans\n  lines ##\n";
        assert_eq!(kinds(src), [Ident, Newline, Ident, Ident, Newline, Eof]);
    }

    #[test]
    fn test_brackets_join_lines() {
        let src = "f(1,\n      2)\ng";
        assert_eq!(
            kinds(src),
            [Ident, LParen, Number, Comma, Number, RParen, Newline, Ident, Newline, Eof]
        );
    }

    #[test]
    fn test_inconsistent_dedent() {
        let src = "a:\n    b\n  c";
        let error = tokenize_indented(src).unwrap_err();
        assert_eq!(error.to_string(), "3:3: unindent to width 2 does not match any outer indentation level");
    }

    #[test]
    fn test_comment_markers_in_strings_survive() {
        let (tokens, _) = tokenize_indented("s = \"# not // a comment\" # real").unwrap();
        assert_eq!(tokens[2].text, "\"# not // a comment\"");
        assert_eq!(tokens[3].kind, Newline);
    }

    #[test]
    fn test_nested_block_comments() {
        assert_eq!(kinds("a /* x /* y */ z */ b"), [Ident, Ident, Newline, Eof]);
        assert!(tokenize_indented("a /* x /* y */").is_err());
    }
}
