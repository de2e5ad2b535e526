use tracing::trace;

use crate::token::{Token, TokenKind};

/// Fuses a name with the generic-argument span that immediately follows it
/// into one [`TokenKind::Type`] token, and puts the extracted text back into
/// foreign-block tokens.
pub fn merge(tokens: Vec<Token>, blocks: &[String]) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for mut token in tokens {
        match token.kind {
            TokenKind::AngleSpan => {
                if let Some(prev) = out.last_mut() {
                    if prev.kind.is_name() && prev.span.hi() == token.span.lo {
                        trace!(base = %prev.text, args = %token.text, "merged generic type");
                        prev.kind = TokenKind::Type;
                        prev.text.push_str(&token.text);
                        prev.span = prev.span.to(token.span);
                        continue;
                    }
                }
            }
            TokenKind::ForeignBlock(index) => {
                if let Some(block) = blocks.get(index as usize) {
                    token.text.clone_from(block);
                }
            }
            _ => (),
        }
        out.push(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Position, Span};

    fn token(kind: TokenKind, text: &str, lo: usize) -> Token {
        let len = u32::try_from(text.len()).unwrap();
        Token::new(kind, text, Position::new(1, 1), Span::new_of_length(lo, len))
    }

    #[test]
    fn test_only_adjacent_spans_merge() {
        let tokens = vec![
            token(TokenKind::Ident, "Box", 0),
            token(TokenKind::AngleSpan, "<T>", 3),
            token(TokenKind::Decorator, "include", 7),
            token(TokenKind::AngleSpan, "<vector>", 16),
        ];
        let merged = merge(tokens, &[]);
        let texts: Vec<_> = merged.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            texts,
            [
                (TokenKind::Type, "Box<T>"),
                (TokenKind::Decorator, "include"),
                (TokenKind::AngleSpan, "<vector>"),
            ]
        );
        assert_eq!(merged[0].span, Span::new_of_length(0, 6));
    }

    #[test]
    fn test_foreign_text_is_reinserted() {
        let tokens = vec![token(TokenKind::ForeignBlock(0), "__BLOCK_0__", 0)];
        let merged = merge(tokens, &[" int x; ".to_owned()]);
        assert_eq!(merged[0].text, " int x; ");
    }
}
