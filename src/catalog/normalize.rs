//! Raw API records to [`Node`] values.
//!
//! Extraction is structural: a missing optional field becomes an empty attribute,
//! never an error. Records without an `id`, and repeats of an id already seen in the
//! same document, are skipped and reported.

use crate::error::{Error, MalformedReason, MalformedRecordError, Result};
use crate::types::{InfoPair, Level, Node, NodeId};
use serde_json::Value;
use std::collections::HashSet;

/// Nodes extracted from one level document
#[derive(Clone, Debug)]
pub struct NormalizedLevel {
    /// Level of the document
    pub level: Level,
    /// Accepted nodes in source order
    pub nodes: Vec<Node>,
    /// Records that were skipped
    pub skipped: Vec<MalformedRecordError>,
}

/// Normalize one level document (`{"result": [...]}`)
///
/// Fails only if the document has no `result` array at all.
pub fn normalize_document(level: Level, document: &Value) -> Result<NormalizedLevel> {
    let records = document
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidDocument {
            level,
            reason: "missing `result` array".to_string(),
        })?;

    let mut nodes = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(records.len());

    for (position, record) in records.iter().enumerate() {
        let Some(node) = normalize_record(level, record) else {
            skipped.push(MalformedRecordError {
                level,
                position,
                reason: MalformedReason::MissingId,
            });
            continue;
        };

        if !seen.insert(node.id.clone()) {
            skipped.push(MalformedRecordError {
                level,
                position,
                reason: MalformedReason::DuplicateId(node.id),
            });
            continue;
        }

        nodes.push(node);
    }

    if !skipped.is_empty() {
        tracing::warn!(
            level = %level,
            skipped = skipped.len(),
            kept = nodes.len(),
            "Skipped malformed catalog records"
        );
        for issue in &skipped {
            tracing::debug!(%issue, "Malformed record");
        }
    }

    Ok(NormalizedLevel {
        level,
        nodes,
        skipped,
    })
}

/// Normalize a single record; `None` when it has no usable id
pub fn normalize_record(level: Level, record: &Value) -> Option<Node> {
    let id = record.get("id").and_then(identifier)?;
    let attributes = record.get("attributes");
    let attribute = |name: &str| attributes.and_then(|attrs| attrs.get(name));

    Some(Node {
        id,
        signature: record.get("signature").and_then(text),
        level,
        parent_id: attribute("parent").and_then(identifier),
        sig3: attribute("sig3").and_then(text),
        image_digital_id: attribute("imagedigital").and_then(image_number),
        wossig_id: attribute("wossig").and_then(text),
        info_pairs: attribute("info2").map(info_pairs).unwrap_or_default(),
    })
}

/// Ids arrive as strings or integers; empty strings do not count
fn identifier(value: &Value) -> Option<NodeId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(NodeId::new(s.trim())),
        Value::Number(n) => Some(NodeId::new(n.to_string())),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn image_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Empty strings, zero, `false` and empty collections carry no info value
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn info_pairs(value: &Value) -> Vec<InfoPair> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let key = entry.get("key").and_then(text)?;
            let value = entry
                .get("value")
                .filter(|value| !is_blank(value))
                .and_then(text);
            Some(InfoPair { key, value })
        })
        .collect()
}
