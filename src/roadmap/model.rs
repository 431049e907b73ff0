//! The repaired roadmap: a strict tree of nodes indexed by id.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// A learning resource attached to a step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
	/// Display title.
	pub title: String,
	/// Free-form tag such as `youtube`, `documentation`, `course`.
	#[serde(rename = "type")]
	pub kind: String,
	/// Link target.
	pub url: String,
}

/// One roadmap step. Field names serialize in the generator's wire format so a
/// repaired document can be fed back through the pipeline unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
	/// Unique within a roadmap.
	pub id: String,
	/// Short title drawn on the canvas.
	pub label: String,
	/// Long-form text for the side panel.
	pub description: String,
	/// Distance from the root once repaired.
	pub level: u32,
	/// Category tag (`basics`, `practice`, `goal`, ...).
	pub category: String,
	/// Human readable duration, e.g. `"2-3 weeks"`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time_estimate: Option<String>,
	/// Ordered child identifiers.
	pub children: Vec<String>,
	/// Attached learning resources.
	pub resources: Vec<Resource>,
}

/// Parent to child link derived from a node's child list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge<'a> {
	/// Parent identifier.
	pub source: &'a str,
	/// Child identifier.
	pub target: &'a str,
}

/// A repaired roadmap: a strictly leveled tree rooted at a single node, with
/// every child reference resolving and every node reachable.
///
/// Only the repair pipeline constructs one, so holding a `Roadmap` is proof the
/// tree invariants hold.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Roadmap {
	title: String,
	nodes: Vec<Node>,
	#[serde(skip)]
	index: HashMap<String, usize>,
	#[serde(skip)]
	root: usize,
}

impl Roadmap {
	pub(crate) fn from_repaired(title: String, nodes: Vec<Node>, root: usize) -> Self {
		let index = nodes
			.iter()
			.enumerate()
			.map(|(i, node)| (node.id.clone(), i))
			.collect();
		Self {
			title,
			nodes,
			index,
			root,
		}
	}

	/// Roadmap title as supplied by the generator.
	pub fn title(&self) -> &str {
		&self.title
	}

	/// Nodes in document order.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// Number of nodes, always at least one.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Always false; kept for the `len` convention.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// The level-0 node.
	pub fn root(&self) -> &Node {
		&self.nodes[self.root]
	}

	/// Looks a node up by identifier.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.index.get(id).map(|&i| &self.nodes[i])
	}

	/// Whether `id` names a node of this roadmap.
	pub fn contains(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	/// All parent to child edges, parents in document order.
	pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
		self.nodes.iter().flat_map(|node| {
			node.children.iter().map(move |child| Edge {
				source: &node.id,
				target: child,
			})
		})
	}

	/// Every node strictly below `id`, breadth first. Empty for unknown ids
	/// and leaves.
	pub fn descendants(&self, id: &str) -> Vec<&str> {
		let mut out = Vec::new();
		let Some(start) = self.node(id) else {
			return out;
		};
		let mut queue: VecDeque<&Node> = VecDeque::from([start]);
		while let Some(node) = queue.pop_front() {
			for child in &node.children {
				if let Some(child_node) = self.node(child) {
					out.push(child_node.id.as_str());
					queue.push_back(child_node);
				}
			}
		}
		out
	}

	/// The document in generator wire format, suitable for persistence and
	/// for loading back through the pipeline.
	pub fn to_document(&self) -> serde_json::Value {
		serde_json::json!({
			"title": self.title,
			"nodes": self.nodes,
		})
	}
}
