//! Scope resolution: turns a UI scope descriptor into a concrete [`JobScope`].
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which records of a frame query get flagged when the job reports a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagTarget {
    #[default]
    Frame,
    Children,
    Both,
}

/// The set of records a job targets, as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobScope {
    ByIds {
        target_type: String,
        ids: Vec<String>,
    },
    ByFrameIds {
        frame_ids: Vec<String>,
        include_children: bool,
        flag_target: FlagTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },
    ByFilters {
        target_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        where_clause: Option<String>,
        limit: u64,
        offset: u64,
    },
}

impl JobScope {
    /// Size known without asking the backend, if any.
    pub fn known_size(&self) -> Option<u64> {
        match self {
            JobScope::ByIds { ids, .. } => Some(ids.len() as u64),
            JobScope::ByFilters { limit, .. } if *limit > 0 => Some(*limit),
            // Child counts live on the backend.
            JobScope::ByFilters { .. } | JobScope::ByFrameIds { .. } => None,
        }
    }

    /// A filter scope with no predicate and no limit covers the whole target type.
    pub fn is_entire_target_type(&self) -> bool {
        matches!(
            self,
            JobScope::ByFilters {
                where_clause: None,
                limit: 0,
                ..
            }
        )
    }

    /// Record type the scope targets; frame scopes target frames.
    pub fn target_type(&self) -> &str {
        match self {
            JobScope::ByIds { target_type, .. } | JobScope::ByFilters { target_type, .. } => {
                target_type
            }
            JobScope::ByFrameIds { .. } => "frame",
        }
    }

    /// Derives the scope for one batch window `[offset, offset + limit)`.
    ///
    /// Filter windows are relative to the filter's own base offset.
    pub fn window(&self, offset: u64, limit: u64) -> JobScope {
        match self {
            JobScope::ByIds { target_type, ids } => {
                let start = (offset as usize).min(ids.len());
                let end = (offset.saturating_add(limit) as usize).min(ids.len());
                JobScope::ByIds {
                    target_type: target_type.clone(),
                    ids: ids[start..end].to_vec(),
                }
            }
            JobScope::ByFrameIds {
                frame_ids,
                include_children,
                flag_target,
                ..
            } => JobScope::ByFrameIds {
                frame_ids: frame_ids.clone(),
                include_children: *include_children,
                flag_target: *flag_target,
                offset: Some(offset),
                limit: Some(limit),
            },
            JobScope::ByFilters {
                target_type,
                where_clause,
                offset: base,
                ..
            } => JobScope::ByFilters {
                target_type: target_type.clone(),
                where_clause: where_clause.clone(),
                limit,
                offset: base + offset,
            },
        }
    }
}

/// How the operator chose the scope, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScopeDescriptor {
    /// Records currently selected in the table/graph view.
    Selection {
        target_type: String,
        selected_ids: Vec<String>,
    },
    /// Record ids typed by the operator; must pass remote validation.
    ManualIds { target_type: String },
    /// Frame ids typed by the operator; must pass remote validation.
    FrameIds {
        include_children: bool,
        #[serde(default)]
        flag_target: FlagTarget,
    },
    /// The ambient filter query.
    Filter {
        target_type: String,
        where_clause: Option<String>,
        #[serde(default)]
        limit: u64,
        #[serde(default)]
        offset: u64,
    },
    /// Every record of a type.
    EntireType { target_type: String },
}

impl ScopeDescriptor {
    /// Whether this descriptor relies on operator-typed ids that need validation.
    pub fn id_kind(&self) -> Option<IdKind> {
        match self {
            ScopeDescriptor::ManualIds { .. } => Some(IdKind::Record),
            ScopeDescriptor::FrameIds { .. } => Some(IdKind::Frame),
            _ => None,
        }
    }

    /// Record type typed ids are checked against; empty for frame ids.
    pub fn id_target_type(&self) -> &str {
        match self {
            ScopeDescriptor::ManualIds { target_type } => target_type,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Record,
    Frame,
}

/// Result of validating operator-typed ids against the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdValidation {
    #[default]
    Idle,
    Pending {
        generation: u64,
        ids: Vec<String>,
    },
    Valid {
        ids: Vec<String>,
    },
    Invalid {
        unknown: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSize {
    Exact(u64),
    /// Needs a `count-scope` round trip before planning.
    NeedsCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub scope: JobScope,
    pub size: ScopeSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("no records selected")]
    EmptySelection,
    #[error("no ids entered")]
    EmptyIds,
    #[error("ids have not been validated yet: {}", .0.join(", "))]
    Unvalidated(Vec<String>),
    #[error("unknown ids: {}", .0.join(", "))]
    UnknownIds(Vec<String>),
    #[error("target type is empty")]
    MissingTargetType,
}

/// Splits operator input on commas and whitespace, dropping blanks and duplicates.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(ToOwned::to_owned)
        .collect()
}

/// Resolves a descriptor into a backend scope plus a size estimate.
///
/// Manual and frame ids are only accepted once `validation` reports them valid.
pub fn resolve_scope(
    descriptor: &ScopeDescriptor,
    validation: &IdValidation,
) -> Result<ResolvedScope, ScopeError> {
    let scope = match descriptor {
        ScopeDescriptor::Selection {
            target_type,
            selected_ids,
        } => {
            require_target_type(target_type)?;
            if selected_ids.is_empty() {
                return Err(ScopeError::EmptySelection);
            }
            JobScope::ByIds {
                target_type: target_type.clone(),
                ids: selected_ids.clone(),
            }
        }
        ScopeDescriptor::ManualIds { target_type } => {
            require_target_type(target_type)?;
            JobScope::ByIds {
                target_type: target_type.clone(),
                ids: validated_ids(validation)?,
            }
        }
        ScopeDescriptor::FrameIds {
            include_children,
            flag_target,
        } => JobScope::ByFrameIds {
            frame_ids: validated_ids(validation)?,
            include_children: *include_children,
            flag_target: *flag_target,
            offset: None,
            limit: None,
        },
        ScopeDescriptor::Filter {
            target_type,
            where_clause,
            limit,
            offset,
        } => {
            require_target_type(target_type)?;
            JobScope::ByFilters {
                target_type: target_type.clone(),
                where_clause: where_clause
                    .as_deref()
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(ToOwned::to_owned),
                limit: *limit,
                offset: *offset,
            }
        }
        ScopeDescriptor::EntireType { target_type } => {
            require_target_type(target_type)?;
            JobScope::ByFilters {
                target_type: target_type.clone(),
                where_clause: None,
                limit: 0,
                offset: 0,
            }
        }
    };

    let size = scope
        .known_size()
        .map_or(ScopeSize::NeedsCount, ScopeSize::Exact);

    Ok(ResolvedScope { scope, size })
}

fn require_target_type(target_type: &str) -> Result<(), ScopeError> {
    if target_type.trim().is_empty() {
        Err(ScopeError::MissingTargetType)
    } else {
        Ok(())
    }
}

fn validated_ids(validation: &IdValidation) -> Result<Vec<String>, ScopeError> {
    match validation {
        IdValidation::Idle => Err(ScopeError::EmptyIds),
        IdValidation::Pending { ids, .. } if ids.is_empty() => Err(ScopeError::EmptyIds),
        IdValidation::Pending { ids, .. } => Err(ScopeError::Unvalidated(ids.clone())),
        IdValidation::Invalid { unknown } => Err(ScopeError::UnknownIds(unknown.clone())),
        IdValidation::Valid { ids } if ids.is_empty() => Err(ScopeError::EmptyIds),
        IdValidation::Valid { ids } => Ok(ids.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_splits_on_commas_and_whitespace() {
        assert_eq!(
            parse_id_list(" a, b\n\nc  a ,"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_id_list(" ,\n ").is_empty());
    }

    #[test]
    fn filter_window_is_relative_to_base_offset() {
        let scope = JobScope::ByFilters {
            target_type: "entry".into(),
            where_clause: Some("status = 'draft'".into()),
            limit: 0,
            offset: 100,
        };
        match scope.window(3000, 3000) {
            JobScope::ByFilters { offset, limit, .. } => {
                assert_eq!(offset, 3100);
                assert_eq!(limit, 3000);
            }
            other => panic!("unexpected scope {other:?}"),
        }
    }

    #[test]
    fn frame_window_pages_the_frame_query() {
        let scope = JobScope::ByFrameIds {
            frame_ids: vec!["f1".into(), "f2".into()],
            include_children: true,
            flag_target: FlagTarget::Children,
            offset: None,
            limit: None,
        };
        assert_eq!(
            scope.window(3000, 1500),
            JobScope::ByFrameIds {
                frame_ids: vec!["f1".into(), "f2".into()],
                include_children: true,
                flag_target: FlagTarget::Children,
                offset: Some(3000),
                limit: Some(1500),
            }
        );
    }

    #[test]
    fn manual_ids_carry_their_target_type() {
        let manual = ScopeDescriptor::ManualIds {
            target_type: "entry".into(),
        };
        assert_eq!(manual.id_kind(), Some(IdKind::Record));
        assert_eq!(manual.id_target_type(), "entry");

        let frames = ScopeDescriptor::FrameIds {
            include_children: false,
            flag_target: FlagTarget::Frame,
        };
        assert_eq!(frames.id_kind(), Some(IdKind::Frame));
        assert_eq!(frames.id_target_type(), "");
    }

    #[test]
    fn id_window_clamps_to_list() {
        let scope = JobScope::ByIds {
            target_type: "entry".into(),
            ids: (0..5).map(|i| i.to_string()).collect(),
        };
        assert_eq!(
            scope.window(3, 10),
            JobScope::ByIds {
                target_type: "entry".into(),
                ids: vec!["3".into(), "4".into()],
            }
        );
    }

    #[test]
    fn entire_type_is_unlimited_filter() {
        let resolved = resolve_scope(
            &ScopeDescriptor::EntireType {
                target_type: "entry".into(),
            },
            &IdValidation::Idle,
        )
        .unwrap();
        assert!(resolved.scope.is_entire_target_type());
        assert_eq!(resolved.size, ScopeSize::NeedsCount);
    }

    #[test]
    fn scope_serializes_with_kind_tag() {
        let scope = JobScope::ByIds {
            target_type: "entry".into(),
            ids: vec!["a".into()],
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["kind"], "byIds");
        assert_eq!(json["targetType"], "entry");
        assert_eq!(json["ids"][0], "a");
    }
}
