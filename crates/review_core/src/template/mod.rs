//! Prompt template language: `{{ path | pipe(args) }}` and `{% for x in path %}...{% endfor %}`.
//!
//! Parsing is strict (unclosed loops and unknown pipes are errors), rendering is
//! lenient: unresolved variables render as empty text and are reported on a
//! separate warning channel instead.
mod cluster;
mod lex;
mod parse;
mod render;
mod suggest;

use std::fmt;

use thiserror::Error;

pub use cluster::{
    default_k, ClusterStrategy, ClusteringError, ClusteringFailure, ClusteringOptions,
};
pub use render::{RenderOptions, RenderOutput, RenderWarning};
pub use suggest::{
    open_loops_at, suggest_variables, LoopSpan, Suggestion, SuggestionOrigin, VariableCatalog,
    VariableShape, VariableSpec,
};

/// Per-record name → value map a template renders against.
pub type Bindings = serde_json::Map<String, serde_json::Value>;

/// Converts a JSON object into bindings; anything else yields empty bindings.
pub fn bindings_from(value: serde_json::Value) -> Bindings {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Bindings::new(),
    }
}

/// Dotted variable path such as `record.parent.label`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariablePath(Vec<String>);

impl VariablePath {
    /// Parses `ident(.ident|.index)*`; the first segment must be an identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw.trim().split('.').map(ToOwned::to_owned).collect();
        let (first, rest) = segments.split_first()?;
        if !is_ident(first) {
            return None;
        }
        if !rest
            .iter()
            .all(|s| is_ident(s) || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())))
        {
            return None;
        }
        Some(Self(segments))
    }

    pub fn root(&self) -> &str {
        &self.0[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pipe {
    Join(String),
    Default(String),
    Upper,
    Lower,
    Length,
    Truncate(usize),
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    pub path: VariablePath,
    pub pipe: Option<Pipe>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub var: String,
    pub collection: VariablePath,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    Variable(VariableRef),
    ForLoop(ForLoop),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("tag opened at byte {offset} is never closed")]
    UnterminatedTag { offset: usize },
    #[error("loop over `{var}` opened at byte {offset} has no matching endfor")]
    UnclosedLoop { var: String, offset: usize },
    #[error("endfor at byte {offset} has no open loop")]
    UnmatchedEndFor { offset: usize },
    #[error("invalid tag `{tag}` at byte {offset}")]
    InvalidTag { tag: String, offset: usize },
    #[error("invalid variable path `{path}` at byte {offset}")]
    InvalidPath { path: String, offset: usize },
    #[error("invalid pipe `{pipe}` at byte {offset}")]
    InvalidPipe { pipe: String, offset: usize },
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let nodes = parse::parse_nodes(source)?;
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// True when the template has nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    pub fn render(&self, bindings: &Bindings) -> RenderOutput {
        self.render_with(bindings, &RenderOptions::default())
    }

    pub fn render_with(&self, bindings: &Bindings, options: &RenderOptions) -> RenderOutput {
        render::render_nodes(&self.nodes, bindings, options)
    }

    /// Whether any loop (at any depth) iterates over `collection`.
    pub fn loops_over(&self, collection: &str) -> bool {
        render::contains_loop_over(&self.nodes, collection)
    }
}
