use serde_json::Value;

use super::cluster::{cluster_items, ClusteringError, ClusteringFailure, ClusteringOptions};
use super::{Bindings, ForLoop, Node, Pipe, VariablePath, VariableRef};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub clustering: Option<ClusteringOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderWarning {
    /// A variable outside any loop resolved to nothing; usually a template/mode mismatch.
    UnresolvedVariable { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderOutput {
    pub text: String,
    pub warnings: Vec<RenderWarning>,
    pub clustering_error: Option<ClusteringError>,
}

struct Renderer<'a> {
    globals: &'a Bindings,
    options: &'a RenderOptions,
    /// Loop variables, innermost last.
    scopes: Vec<(String, Value)>,
    out: RenderOutput,
}

pub(super) fn render_nodes(
    nodes: &[Node],
    globals: &Bindings,
    options: &RenderOptions,
) -> RenderOutput {
    let mut renderer = Renderer {
        globals,
        options,
        scopes: Vec::new(),
        out: RenderOutput::default(),
    };

    if let Some(clustering) = &options.clustering {
        if !contains_loop_over(nodes, &clustering.collection) {
            renderer.out.clustering_error = Some(ClusteringError {
                collection: clustering.collection.clone(),
                reason: ClusteringFailure::NoLoopOverCollection,
            });
        }
    }

    renderer.render_all(nodes);
    renderer.out
}

pub(super) fn contains_loop_over(nodes: &[Node], collection: &str) -> bool {
    nodes.iter().any(|node| match node {
        Node::ForLoop(l) => {
            l.collection.to_string() == collection || contains_loop_over(&l.body, collection)
        }
        _ => false,
    })
}

impl Renderer<'_> {
    fn render_all(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Literal(text) => self.out.text.push_str(text),
                Node::Variable(var) => self.render_variable(var),
                Node::ForLoop(l) => self.render_loop(l),
            }
        }
    }

    fn render_variable(&mut self, var: &VariableRef) {
        let value = self.lookup(&var.path).cloned();
        if value.is_none() && !matches!(var.pipe, Some(Pipe::Default(_))) {
            self.warn_unresolved(&var.path);
        }
        let text = apply_pipe(value.as_ref(), var.pipe.as_ref());
        self.out.text.push_str(&text);
    }

    fn render_loop(&mut self, l: &ForLoop) {
        let collection = self.lookup(&l.collection).cloned();
        if collection.is_none() {
            self.warn_unresolved(&l.collection);
        }

        let options = self.options;
        let clustering = options
            .clustering
            .as_ref()
            .filter(|c| c.collection == l.collection.to_string());

        let items = match (clustering, collection) {
            (Some(options), collection) => match self.clustered(options, collection) {
                Some(items) => items,
                None => return,
            },
            (None, Some(Value::Array(items))) => items,
            (None, _) => return,
        };

        for item in items {
            // Shadows any outer binding of the same name for the body only.
            self.scopes.push((l.var.clone(), item));
            self.render_all(&l.body);
            self.scopes.pop();
        }
    }

    fn clustered(
        &mut self,
        options: &ClusteringOptions,
        collection: Option<Value>,
    ) -> Option<Vec<Value>> {
        let result = match collection {
            None => Err(ClusteringFailure::CollectionMissing),
            Some(Value::Array(items)) => cluster_items(&items, options),
            Some(_) => Err(ClusteringFailure::NotAList),
        };
        match result {
            Ok(clusters) => Some(clusters),
            Err(reason) => {
                if self.out.clustering_error.is_none() {
                    self.out.clustering_error = Some(ClusteringError {
                        collection: options.collection.clone(),
                        reason,
                    });
                }
                None
            }
        }
    }

    fn lookup(&self, path: &VariablePath) -> Option<&Value> {
        let root = path.root();
        let mut current = self
            .scopes
            .iter()
            .rev()
            .find(|(name, _)| name == root)
            .map(|(_, value)| value)
            .or_else(|| self.globals.get(root))?;

        for segment in &path.segments()[1..] {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn warn_unresolved(&mut self, path: &VariablePath) {
        if !self.scopes.is_empty() {
            return;
        }
        let warning = RenderWarning::UnresolvedVariable {
            path: path.to_string(),
        };
        if !self.out.warnings.contains(&warning) {
            self.out.warnings.push(warning);
        }
    }
}

fn apply_pipe(value: Option<&Value>, pipe: Option<&Pipe>) -> String {
    let Some(pipe) = pipe else {
        return value.map(display_value).unwrap_or_default();
    };
    match pipe {
        Pipe::Default(fallback) => match value {
            None | Some(Value::Null) => fallback.clone(),
            Some(Value::String(s)) if s.is_empty() => fallback.clone(),
            Some(v) => display_value(v),
        },
        Pipe::Join(sep) => match value {
            Some(Value::Array(items)) => items
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join(sep),
            Some(v) => display_value(v),
            None => String::new(),
        },
        Pipe::Upper => value.map(display_value).unwrap_or_default().to_uppercase(),
        Pipe::Lower => value.map(display_value).unwrap_or_default().to_lowercase(),
        Pipe::Length => {
            let len = match value {
                Some(Value::Array(items)) => items.len(),
                Some(Value::Object(map)) => map.len(),
                Some(Value::String(s)) => s.chars().count(),
                Some(Value::Null) | None => 0,
                Some(v) => display_value(v).chars().count(),
            };
            len.to_string()
        }
        Pipe::Truncate(max) => value
            .map(display_value)
            .unwrap_or_default()
            .chars()
            .take(*max)
            .collect(),
        Pipe::Json => value
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .unwrap_or_default(),
    }
}

/// Text form of a bound value: lists of scalars are comma-joined, structures become JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_joins_scalar_lists_and_serializes_structures() {
        assert_eq!(display_value(&json!(["a", 1, true])), "a, 1, true");
        assert_eq!(display_value(&json!({"k": 1})), r#"{"k":1}"#);
        assert_eq!(display_value(&json!([{"k": 1}])), r#"[{"k":1}]"#);
        assert_eq!(display_value(&Value::Null), "");
    }

    #[test]
    fn pipes_transform_values() {
        let list = json!(["x", "y"]);
        assert_eq!(apply_pipe(Some(&list), Some(&Pipe::Join(" | ".into()))), "x | y");
        assert_eq!(apply_pipe(Some(&list), Some(&Pipe::Length)), "2");
        assert_eq!(apply_pipe(None, Some(&Pipe::Default("n/a".into()))), "n/a");
        assert_eq!(apply_pipe(Some(&json!("")), Some(&Pipe::Default("n/a".into()))), "n/a");
        assert_eq!(apply_pipe(Some(&json!("héllo")), Some(&Pipe::Truncate(2))), "hé");
        assert_eq!(apply_pipe(Some(&json!("Mixed")), Some(&Pipe::Upper)), "MIXED");
        assert_eq!(apply_pipe(Some(&json!("a\"b")), Some(&Pipe::Json)), r#""a\"b""#);
    }
}
