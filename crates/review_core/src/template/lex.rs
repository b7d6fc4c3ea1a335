use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind<'a> {
    Text(&'a str),
    /// Inner text of `{{ ... }}`.
    Variable(&'a str),
    /// Inner text of `{% ... %}`.
    Block(&'a str),
    /// A `{{` or `{%` with no closer; runs to end of input.
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BlockTag<'a> {
    For { var: &'a str, collection: &'a str },
    EndFor,
}

pub(crate) fn lex(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let next_var = rest.find("{{");
        let next_block = rest.find("{%");
        let (rel, closer, is_block) = match (next_var, next_block) {
            (None, None) => {
                tokens.push(Token {
                    kind: TokenKind::Text(rest),
                    span: pos..source.len(),
                });
                break;
            }
            (Some(v), Some(b)) if b < v => (b, "%}", true),
            (Some(v), _) => (v, "}}", false),
            (None, Some(b)) => (b, "%}", true),
        };

        let start = pos + rel;
        if start > pos {
            tokens.push(Token {
                kind: TokenKind::Text(&source[pos..start]),
                span: pos..start,
            });
        }

        let inner_start = start + 2;
        match source[inner_start..].find(closer) {
            Some(close_rel) => {
                let inner_end = inner_start + close_rel;
                let inner = &source[inner_start..inner_end];
                let kind = if is_block {
                    TokenKind::Block(inner)
                } else {
                    TokenKind::Variable(inner)
                };
                tokens.push(Token {
                    kind,
                    span: start..inner_end + 2,
                });
                pos = inner_end + 2;
            }
            None => {
                tokens.push(Token {
                    kind: TokenKind::Unterminated,
                    span: start..source.len(),
                });
                break;
            }
        }
    }

    tokens
}

/// Recognises `for X in path` and `endfor`; anything else is `None`.
pub(crate) fn block_tag(inner: &str) -> Option<BlockTag<'_>> {
    let words: Vec<&str> = inner.split_whitespace().collect();
    match words.as_slice() {
        ["for", var, "in", collection] => Some(BlockTag::For {
            var: *var,
            collection: *collection,
        }),
        ["endfor"] => Some(BlockTag::EndFor),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_variables_and_blocks() {
        let tokens = lex("a {{x}} {% endfor %}b");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Text("a "),
                TokenKind::Variable("x"),
                TokenKind::Text(" "),
                TokenKind::Block(" endfor "),
                TokenKind::Text("b"),
            ]
        );
        assert_eq!(tokens[1].span, 2..7);
    }

    #[test]
    fn unterminated_tag_swallows_rest() {
        let tokens = lex("hi {{ name");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Unterminated);
        assert_eq!(tokens.last().unwrap().span, 3..10);
    }

    #[test]
    fn block_tags_need_exact_shape() {
        assert_eq!(
            block_tag(" for x in items "),
            Some(BlockTag::For {
                var: "x",
                collection: "items"
            })
        );
        assert_eq!(block_tag("endfor"), Some(BlockTag::EndFor));
        assert_eq!(block_tag("for x items"), None);
    }
}
