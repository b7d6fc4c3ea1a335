//! Autocomplete support: which loops enclose the cursor and which variables to offer.
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::lex::{block_tag, BlockTag};

/// Shape of a variable exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "fields", rename_all = "snake_case")]
pub enum VariableShape {
    Scalar,
    Object(Vec<VariableSpec>),
    /// A list whose items have these fields.
    List(Vec<VariableSpec>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub shape: VariableShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableSpec {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: VariableShape::Scalar,
            description: None,
        }
    }

    pub fn list(name: impl Into<String>, item_fields: Vec<VariableSpec>) -> Self {
        Self {
            name: name.into(),
            shape: VariableShape::List(item_fields),
            description: None,
        }
    }

    pub fn object(name: impl Into<String>, fields: Vec<VariableSpec>) -> Self {
        Self {
            name: name.into(),
            shape: VariableShape::Object(fields),
            description: None,
        }
    }
}

/// Global variables available for the current job mode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableCatalog {
    pub globals: Vec<VariableSpec>,
}

/// A `for` loop located in raw (possibly incomplete) template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSpan {
    pub var: String,
    pub collection: String,
    /// Byte offset where the `{% for %}` tag starts.
    pub open_start: usize,
    /// Byte offset just past the `{% for %}` tag.
    pub body_start: usize,
    /// Byte offset where the matching `{% endfor %}` starts, if any.
    pub close_start: Option<usize>,
    pub depth: usize,
}

impl LoopSpan {
    fn encloses(&self, cursor: usize) -> bool {
        self.body_start <= cursor && self.close_start.map_or(true, |close| cursor <= close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionOrigin {
    /// A field of an enclosing loop's item, e.g. `child.label`.
    LoopField { depth: usize },
    /// An enclosing loop's variable itself.
    LoopVariable { depth: usize },
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub origin: SuggestionOrigin,
    pub description: Option<String>,
}

/// Every complete `{% ... %}` tag in `source`, with its inner text.
///
/// Variable tags are not tracked, so a half-typed `{{` cannot hide the block
/// tags after it. Scanning stops at a `{%` with no closer.
fn block_tags(source: &str) -> Vec<(Range<usize>, &str)> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while let Some(rel) = source[pos..].find("{%") {
        let start = pos + rel;
        let inner_start = start + 2;
        let Some(close_rel) = source[inner_start..].find("%}") else {
            break;
        };
        let inner_end = inner_start + close_rel;
        tags.push((start..inner_end + 2, &source[inner_start..inner_end]));
        pos = inner_end + 2;
    }
    tags
}

/// Pairs every `for` with its `endfor` across the whole text.
///
/// Each `endfor` closes the most recently opened loop that is still unmatched at
/// that point, so a loop is matched by depth rather than by proximity to any cursor.
fn loop_spans(source: &str) -> Vec<LoopSpan> {
    let mut spans: Vec<LoopSpan> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    for (span, inner) in block_tags(source) {
        match block_tag(inner) {
            Some(BlockTag::For { var, collection }) => {
                open.push(spans.len());
                spans.push(LoopSpan {
                    var: var.to_string(),
                    collection: collection.to_string(),
                    open_start: span.start,
                    body_start: span.end,
                    close_start: None,
                    depth: open.len() - 1,
                });
            }
            Some(BlockTag::EndFor) => {
                if let Some(index) = open.pop() {
                    spans[index].close_start = Some(span.start);
                }
            }
            None => {}
        }
    }

    spans
}

/// Loops whose body contains `cursor`, outermost first.
///
/// A loop that was already closed before the cursor does not count, even if it is
/// the nearest `for` tag preceding it.
pub fn open_loops_at(source: &str, cursor: usize) -> Vec<LoopSpan> {
    let mut enclosing: Vec<LoopSpan> = loop_spans(source)
        .into_iter()
        .filter(|span| span.encloses(cursor))
        .collect();
    enclosing.sort_by_key(|span| span.depth);
    enclosing
}

/// Variables to offer at `cursor`, filtered by `prefix`.
///
/// Fields of the innermost enclosing loop come first, then outer loops, then the
/// loop variables, then globals.
pub fn suggest_variables(
    source: &str,
    cursor: usize,
    catalog: &VariableCatalog,
    prefix: &str,
) -> Vec<Suggestion> {
    let loops = open_loops_at(source, cursor);
    let mut suggestions = Vec::new();

    for (index, span) in loops.iter().enumerate().rev() {
        let Some(fields) = item_fields(&loops[..index], span, catalog) else {
            continue;
        };
        for field in fields {
            suggestions.push(Suggestion {
                text: format!("{}.{}", span.var, field.name),
                origin: SuggestionOrigin::LoopField { depth: span.depth },
                description: field.description.clone(),
            });
        }
    }

    for span in loops.iter().rev() {
        suggestions.push(Suggestion {
            text: span.var.clone(),
            origin: SuggestionOrigin::LoopVariable { depth: span.depth },
            description: None,
        });
    }

    for global in &catalog.globals {
        // Shadowed by a loop variable of the same name.
        if loops.iter().any(|span| span.var == global.name) {
            continue;
        }
        suggestions.push(Suggestion {
            text: global.name.clone(),
            origin: SuggestionOrigin::Global,
            description: global.description.clone(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    suggestions.retain(|s| s.text.starts_with(prefix) && seen.insert(s.text.clone()));
    suggestions
}

/// Item fields of the list `span` iterates, resolved through outer loops and globals.
fn item_fields<'a>(
    outer: &[LoopSpan],
    span: &LoopSpan,
    catalog: &'a VariableCatalog,
) -> Option<&'a [VariableSpec]> {
    let mut segments = span.collection.split('.');
    let root = segments.next()?;

    let mut shape = match outer.iter().rposition(|o| o.var == root) {
        Some(index) => {
            let fields = item_fields(&outer[..index], &outer[index], catalog)?;
            ObjectView::Fields(fields)
        }
        None => {
            let global = catalog.globals.iter().find(|g| g.name == root)?;
            ObjectView::Shape(&global.shape)
        }
    };

    for segment in segments {
        let fields = match shape {
            ObjectView::Fields(fields) => fields,
            ObjectView::Shape(VariableShape::Object(fields)) => fields.as_slice(),
            ObjectView::Shape(_) => return None,
        };
        let field = fields.iter().find(|f| f.name == segment)?;
        shape = ObjectView::Shape(&field.shape);
    }

    match shape {
        ObjectView::Shape(VariableShape::List(fields)) => Some(fields.as_slice()),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum ObjectView<'a> {
    /// Fields of a loop item.
    Fields(&'a [VariableSpec]),
    Shape(&'a VariableShape),
}
