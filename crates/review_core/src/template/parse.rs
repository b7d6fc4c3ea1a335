use super::lex::{block_tag, lex, BlockTag, TokenKind};
use super::{is_ident, ForLoop, Node, Pipe, TemplateError, VariablePath, VariableRef};

struct OpenLoop {
    var: String,
    collection: VariablePath,
    offset: usize,
    body: Vec<Node>,
}

/// Builds the node tree. Loops are matched by depth: each `endfor` closes the
/// innermost loop still open at that point.
pub(super) fn parse_nodes(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut root = Vec::new();
    let mut stack: Vec<OpenLoop> = Vec::new();

    for token in lex(source) {
        let offset = token.span.start;
        match token.kind {
            TokenKind::Text(text) => push(&mut root, &mut stack, Node::Literal(text.to_string())),
            TokenKind::Variable(inner) => {
                let var = parse_variable(inner, offset)?;
                push(&mut root, &mut stack, Node::Variable(var));
            }
            TokenKind::Block(inner) => match block_tag(inner) {
                Some(BlockTag::For { var, collection }) => {
                    if !is_ident(var) {
                        return Err(TemplateError::InvalidTag {
                            tag: inner.trim().to_string(),
                            offset,
                        });
                    }
                    let collection = VariablePath::parse(collection).ok_or_else(|| {
                        TemplateError::InvalidPath {
                            path: collection.to_string(),
                            offset,
                        }
                    })?;
                    stack.push(OpenLoop {
                        var: var.to_string(),
                        collection,
                        offset,
                        body: Vec::new(),
                    });
                }
                Some(BlockTag::EndFor) => {
                    let open = stack
                        .pop()
                        .ok_or(TemplateError::UnmatchedEndFor { offset })?;
                    let node = Node::ForLoop(ForLoop {
                        var: open.var,
                        collection: open.collection,
                        body: open.body,
                    });
                    push(&mut root, &mut stack, node);
                }
                None => {
                    return Err(TemplateError::InvalidTag {
                        tag: inner.trim().to_string(),
                        offset,
                    })
                }
            },
            TokenKind::Unterminated => return Err(TemplateError::UnterminatedTag { offset }),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(TemplateError::UnclosedLoop {
            var: open.var,
            offset: open.offset,
        });
    }

    Ok(root)
}

fn push(root: &mut Vec<Node>, stack: &mut [OpenLoop], node: Node) {
    match stack.last_mut() {
        Some(open) => open.body.push(node),
        None => root.push(node),
    }
}

fn parse_variable(inner: &str, offset: usize) -> Result<VariableRef, TemplateError> {
    let (path_text, pipe_text) = match inner.split_once('|') {
        Some((path, pipe)) => (path, Some(pipe)),
        None => (inner, None),
    };
    let path = VariablePath::parse(path_text).ok_or_else(|| TemplateError::InvalidPath {
        path: path_text.trim().to_string(),
        offset,
    })?;
    let pipe = pipe_text
        .map(|text| {
            parse_pipe(text.trim()).ok_or_else(|| TemplateError::InvalidPipe {
                pipe: text.trim().to_string(),
                offset,
            })
        })
        .transpose()?;
    Ok(VariableRef { path, pipe })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PipeArg {
    Str(String),
    Num(u64),
}

impl PipeArg {
    fn into_text(self) -> String {
        match self {
            PipeArg::Str(s) => s,
            PipeArg::Num(n) => n.to_string(),
        }
    }
}

fn parse_pipe(text: &str) -> Option<Pipe> {
    let (name, args) = match text.find('(') {
        Some(open) => {
            let inner = text[open + 1..].strip_suffix(')')?;
            (text[..open].trim(), parse_args(inner)?)
        }
        None => (text, Vec::new()),
    };

    let mut args = args.into_iter();
    let pipe = match name {
        "join" => Pipe::Join(args.next().map_or_else(|| ", ".to_string(), PipeArg::into_text)),
        "default" => Pipe::Default(args.next()?.into_text()),
        "upper" => Pipe::Upper,
        "lower" => Pipe::Lower,
        "length" => Pipe::Length,
        "json" => Pipe::Json,
        "truncate" => match args.next()? {
            PipeArg::Num(n) => Pipe::Truncate(usize::try_from(n).ok()?),
            PipeArg::Str(_) => return None,
        },
        _ => return None,
    };
    if args.next().is_some() {
        return None;
    }
    Some(pipe)
}

/// Comma-separated quoted strings or unsigned integers.
fn parse_args(inner: &str) -> Option<Vec<PipeArg>> {
    let mut args = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        match first {
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => value.push(chars.next()?),
                        c if c == first => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return None;
                }
                args.push(PipeArg::Str(value));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                args.push(PipeArg::Num(digits.parse().ok()?));
            }
            _ => return None,
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(path: &str, pipe: Option<Pipe>) -> Node {
        Node::Variable(VariableRef {
            path: VariablePath::parse(path).unwrap(),
            pipe,
        })
    }

    #[test]
    fn parses_literal_and_piped_variable() {
        let nodes = parse_nodes("Tags: {{ tags | join(' / ') }}.").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Literal("Tags: ".into()),
                var("tags", Some(Pipe::Join(" / ".into()))),
                Node::Literal(".".into()),
            ]
        );
    }

    #[test]
    fn nested_loops_close_innermost_first() {
        let nodes =
            parse_nodes("{% for a in groups %}{% for b in a.items %}{{b}}{% endfor %}!{% endfor %}")
                .unwrap();
        let Node::ForLoop(outer) = &nodes[0] else {
            panic!("expected loop");
        };
        assert_eq!(outer.var, "a");
        assert_eq!(outer.body.len(), 2);
        let Node::ForLoop(inner) = &outer.body[0] else {
            panic!("expected inner loop");
        };
        assert_eq!(inner.collection.to_string(), "a.items");
        assert_eq!(outer.body[1], Node::Literal("!".into()));
    }

    #[test]
    fn unclosed_loop_is_an_error() {
        let err = parse_nodes("x {% for a in items %}{{a}}").unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnclosedLoop {
                var: "a".into(),
                offset: 2
            }
        );
    }

    #[test]
    fn stray_endfor_is_an_error() {
        let err = parse_nodes("{% endfor %}").unwrap_err();
        assert_eq!(err, TemplateError::UnmatchedEndFor { offset: 0 });
    }

    #[test]
    fn unknown_pipe_is_an_error() {
        assert!(matches!(
            parse_nodes("{{ a | shout() }}"),
            Err(TemplateError::InvalidPipe { .. })
        ));
        assert!(matches!(
            parse_nodes("{{ a | truncate('x') }}"),
            Err(TemplateError::InvalidPipe { .. })
        ));
    }

    #[test]
    fn pipe_args_support_escapes_and_numbers() {
        assert_eq!(parse_pipe(r"join('it\'s')"), Some(Pipe::Join("it's".into())));
        assert_eq!(parse_pipe("truncate( 12 )"), Some(Pipe::Truncate(12)));
        assert_eq!(parse_pipe("upper"), Some(Pipe::Upper));
        assert_eq!(parse_pipe("default(\"n/a\")"), Some(Pipe::Default("n/a".into())));
        assert_eq!(parse_pipe("join(', ', ';')"), None);
    }
}
