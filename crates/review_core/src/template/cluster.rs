use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::render::display_value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "field", rename_all = "snake_case")]
pub enum ClusterStrategy {
    /// Contiguous, near-equal chunks in list order.
    Position,
    /// Groups sharing the same value of a field (e.g. a precomputed semantic label).
    ByField(String),
}

/// Pre-groups one loop's list into clusters before iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringOptions {
    /// Dotted path of the loop collection to cluster, as written in the template.
    pub collection: String,
    pub strategy: ClusterStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_override: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringFailure {
    CollectionMissing,
    NotAList,
    NoLoopOverCollection,
    InvalidK,
}

/// Reported alongside a render instead of silently rendering unclustered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("clustering `{collection}` failed: {reason:?}")]
pub struct ClusteringError {
    pub collection: String,
    pub reason: ClusteringFailure,
}

/// `ceil(sqrt(n / 2))`, clamped to `[1, n]`.
pub fn default_k(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let k = ((n as f64) / 2.0).sqrt().ceil() as usize;
    k.clamp(1, n)
}

/// Groups `items` into cluster objects `{index, label, size, items}`.
pub(crate) fn cluster_items(
    items: &[Value],
    options: &ClusteringOptions,
) -> Result<Vec<Value>, ClusteringFailure> {
    let k = match options.k_override {
        Some(0) => return Err(ClusteringFailure::InvalidK),
        Some(k) => k.min(items.len()),
        None => default_k(items.len()),
    };
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let groups = match &options.strategy {
        ClusterStrategy::Position => by_position(items, k),
        ClusterStrategy::ByField(field) => by_field(items, field, k),
    };

    Ok(groups
        .into_iter()
        .enumerate()
        .map(|(index, (label, members))| {
            json!({
                "index": index + 1,
                "label": label,
                "size": members.len(),
                "items": members,
            })
        })
        .collect())
}

fn by_position(items: &[Value], k: usize) -> Vec<(String, Vec<Value>)> {
    let base = items.len() / k;
    let extra = items.len() % k;
    let mut start = 0;
    (0..k)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let chunk = items[start..start + len].to_vec();
            let label = format!("{}-{}", start + 1, start + len);
            start += len;
            (label, chunk)
        })
        .collect()
}

fn by_field(items: &[Value], field: &str, k: usize) -> Vec<(String, Vec<Value>)> {
    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    for item in items {
        let key = item.get(field).map(display_value).unwrap_or_default();
        match groups.iter_mut().find(|(label, _)| *label == key) {
            Some((_, members)) => members.push(item.clone()),
            None => groups.push((key, vec![item.clone()])),
        }
    }
    if groups.len() > k {
        let overflow: Vec<Value> = groups
            .drain(k - 1..)
            .flat_map(|(_, members)| members)
            .collect();
        groups.push(("other".to_string(), overflow));
    }
    groups
}
