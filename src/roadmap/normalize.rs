//! First pipeline stage: coerce loosely typed generator output into complete
//! [`Node`] records and drop child references that resolve nowhere.

use std::collections::HashSet;

use log::debug;
use serde_json::{Map, Value};

use super::error::{Result, RoadmapError};
use super::model::{Node, Resource};
use super::repair::RepairReport;

/// Label given to nodes that arrive without one.
pub const DEFAULT_LABEL: &str = "Node";
/// Title given to documents that arrive without one.
pub const DEFAULT_TITLE: &str = "Roadmap";

/// A document whose nodes are complete and whose child references all resolve.
/// Depths and reachability are not yet checked.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
	/// Document title.
	pub title: String,
	/// Nodes in document order.
	pub nodes: Vec<Node>,
}

/// Parses raw generator text, tolerating a surrounding Markdown code fence.
pub fn parse_document(text: &str) -> Result<Value> {
	Ok(serde_json::from_str(strip_code_fence(text))?)
}

/// Removes a leading ```` ``` ```` / ```` ```json ```` fence and the matching
/// trailing fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
	let trimmed = text.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);
	rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Validates the document shape and fills every missing or mistyped field.
///
/// Only a non-object document or a missing / non-list `nodes` field is an
/// error. An empty node list is left for the repairer to reject.
pub fn normalize(document: Value, report: &mut RepairReport) -> Result<Normalized> {
	let Value::Object(mut document) = document else {
		return Err(RoadmapError::NotAnObject);
	};
	let raw_nodes = match document.remove("nodes") {
		None | Some(Value::Null) => return Err(RoadmapError::MissingNodes),
		Some(Value::Array(nodes)) => nodes,
		Some(_) => return Err(RoadmapError::NodesNotAList),
	};
	let title = match document.remove("title") {
		Some(Value::String(title)) if !title.trim().is_empty() => title,
		_ => DEFAULT_TITLE.to_string(),
	};

	let records: Vec<Map<String, Value>> = raw_nodes
		.into_iter()
		.map(|raw| match raw {
			Value::Object(record) => record,
			_ => Map::new(),
		})
		.collect();

	let mut ids = IdAllocator::new(records.iter().filter_map(|r| r.get("id").and_then(as_id)));
	let mut nodes: Vec<Node> = records
		.into_iter()
		.map(|record| normalize_node(record, &mut ids, report))
		.collect();

	let known: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
	for node in &mut nodes {
		let before = node.children.len();
		node.children.retain(|child| known.contains(child));
		let dropped = before - node.children.len();
		if dropped > 0 {
			debug!("Dropped {dropped} dangling child reference(s) from {}", node.id);
			report.dangling_references += dropped;
		}
	}

	Ok(Normalized { title, nodes })
}

fn normalize_node(mut record: Map<String, Value>, ids: &mut IdAllocator, report: &mut RepairReport) -> Node {
	let id = match record.get("id").and_then(as_id) {
		Some(id) if ids.claim(&id) => id,
		Some(_) => {
			report.duplicate_ids += 1;
			ids.fresh()
		}
		None => {
			report.synthesized_ids += 1;
			ids.fresh()
		}
	};

	let label = match record.remove("label") {
		Some(Value::String(label)) if !label.is_empty() => label,
		_ => {
			report.defaulted_fields += 1;
			DEFAULT_LABEL.to_string()
		}
	};
	let description = match record.remove("description") {
		Some(Value::String(text)) => text,
		_ => {
			report.defaulted_fields += 1;
			String::new()
		}
	};
	let level = match record.get("level").and_then(as_level) {
		Some(level) => level,
		None => {
			report.defaulted_fields += 1;
			0
		}
	};
	let category = match record.remove("category") {
		Some(Value::String(category)) => category,
		_ => String::new(),
	};
	let time_estimate = match record.remove("timeEstimate") {
		Some(Value::String(estimate)) if !estimate.is_empty() => Some(estimate),
		_ => None,
	};
	let children = match record.remove("children") {
		Some(Value::Array(children)) => children.iter().filter_map(as_id).collect(),
		_ => {
			report.defaulted_fields += 1;
			Vec::new()
		}
	};
	let resources = match record.remove("resources") {
		Some(Value::Array(resources)) => resources.into_iter().filter_map(as_resource).collect(),
		_ => {
			report.defaulted_fields += 1;
			Vec::new()
		}
	};

	Node {
		id,
		label,
		description,
		level,
		category,
		time_estimate,
		children,
		resources,
	}
}

/// Identifiers may come through as strings or integers; blanks count as missing.
fn as_id(value: &Value) -> Option<String> {
	match value {
		Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
		Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
		_ => None,
	}
}

/// Whole non-negative numbers, including float spellings such as `1.0`.
fn as_level(value: &Value) -> Option<u32> {
	if let Some(level) = value.as_u64() {
		return u32::try_from(level).ok();
	}
	let level = value.as_f64()?;
	(level >= 0.0 && level.fract() == 0.0 && level <= f64::from(u32::MAX)).then_some(level as u32)
}

fn as_resource(value: Value) -> Option<Resource> {
	let Value::Object(mut record) = value else {
		return None;
	};
	let mut text = |key: &str| match record.remove(key) {
		Some(Value::String(s)) => s,
		_ => String::new(),
	};
	Some(Resource {
		title: text("title"),
		kind: text("type"),
		url: text("url"),
	})
}

/// Hands out identifiers, reserving every explicit id in the document up front
/// so a synthesized `node_N` never shadows a node that appears later.
struct IdAllocator {
	reserved: HashSet<String>,
	claimed: HashSet<String>,
	next: usize,
}

impl IdAllocator {
	fn new(explicit: impl Iterator<Item = String>) -> Self {
		Self {
			reserved: explicit.collect(),
			claimed: HashSet::new(),
			next: 0,
		}
	}

	/// First holder of an explicit id wins.
	fn claim(&mut self, id: &str) -> bool {
		self.claimed.insert(id.to_string())
	}

	fn fresh(&mut self) -> String {
		loop {
			let candidate = format!("node_{}", self.next);
			self.next += 1;
			if !self.reserved.contains(&candidate) && self.claimed.insert(candidate.clone()) {
				return candidate;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn run(document: Value) -> (Normalized, RepairReport) {
		let mut report = RepairReport::default();
		let normalized = normalize(document, &mut report).expect("valid shape");
		(normalized, report)
	}

	#[test]
	fn fills_missing_fields_with_defaults() {
		let (doc, report) = run(json!({
			"nodes": [{ "level": "two", "children": "a", "resources": {} }]
		}));
		let node = &doc.nodes[0];
		assert_eq!(doc.title, DEFAULT_TITLE);
		assert_eq!(node.id, "node_0");
		assert_eq!(node.label, DEFAULT_LABEL);
		assert_eq!(node.description, "");
		assert_eq!(node.level, 0);
		assert!(node.children.is_empty());
		assert!(node.resources.is_empty());
		assert_eq!(report.synthesized_ids, 1);
		assert_eq!(report.defaulted_fields, 5);
	}

	#[test]
	fn keeps_well_formed_fields() {
		let (doc, report) = run(json!({
			"title": "Learn Rust",
			"nodes": [{
				"id": "main",
				"label": "Rust",
				"description": "Systems programming",
				"level": 0,
				"category": "goal",
				"timeEstimate": "6 months",
				"children": [],
				"resources": [
					{ "title": "The Book", "type": "documentation", "url": "https://doc.rust-lang.org/book/" },
					"not a resource"
				]
			}]
		}));
		let node = &doc.nodes[0];
		assert_eq!(doc.title, "Learn Rust");
		assert_eq!(node.category, "goal");
		assert_eq!(node.time_estimate.as_deref(), Some("6 months"));
		assert_eq!(node.resources.len(), 1);
		assert_eq!(node.resources[0].kind, "documentation");
		assert_eq!(report.total(), 0);
	}

	#[test]
	fn accepts_whole_float_levels() {
		let (doc, _) = run(json!({
			"nodes": [
				{ "id": "a", "level": 1.0 },
				{ "id": "b", "level": 0.0 },
				{ "id": "c", "level": 1.5 },
				{ "id": "d", "level": -2.0 }
			]
		}));
		let levels: Vec<u32> = doc.nodes.iter().map(|n| n.level).collect();
		assert_eq!(levels, vec![1, 0, 0, 0]);
	}

	#[test]
	fn removes_dangling_child_references() {
		let (doc, report) = run(json!({
			"nodes": [
				{ "id": "a", "level": 0, "children": ["b", "ghost", 7] },
				{ "id": "b", "level": 1 }
			]
		}));
		assert_eq!(doc.nodes[0].children, vec!["b".to_string()]);
		assert_eq!(report.dangling_references, 2);
	}

	#[test]
	fn synthesized_ids_avoid_explicit_ones() {
		let (doc, _) = run(json!({
			"nodes": [{ "label": "first" }, { "id": "node_0" }, { "id": 3 }]
		}));
		let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["node_1", "node_0", "3"]);
	}

	#[test]
	fn duplicate_ids_are_renamed() {
		let (doc, report) = run(json!({
			"nodes": [{ "id": "a" }, { "id": "a" }]
		}));
		assert_eq!(doc.nodes[0].id, "a");
		assert_ne!(doc.nodes[1].id, "a");
		assert_eq!(report.duplicate_ids, 1);
	}

	#[test]
	fn rejects_malformed_shapes() {
		let mut report = RepairReport::default();
		assert!(matches!(
			normalize(json!([1, 2]), &mut report),
			Err(RoadmapError::NotAnObject)
		));
		assert!(matches!(
			normalize(json!({ "title": "x" }), &mut report),
			Err(RoadmapError::MissingNodes)
		));
		assert!(matches!(
			normalize(json!({ "nodes": {} }), &mut report),
			Err(RoadmapError::NodesNotAList)
		));
	}

	#[test]
	fn strips_markdown_fences() {
		assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
		assert_eq!(strip_code_fence("```\n[]\n```\n"), "[]");
		assert_eq!(strip_code_fence("  {}  "), "{}");
		assert!(parse_document("```json\n{\"nodes\": []}\n```").is_ok());
		assert!(matches!(parse_document("nope"), Err(RoadmapError::Json(_))));
	}
}
