//! Second pipeline stage: turn a normalized node list into a strictly leveled
//! tree.
//!
//! A breadth-first walk from the root assigns every reachable node its
//! distance as `level` and keeps only the first parent that reaches each node.
//! Nodes the walk never reaches are hung directly under the root and the walk
//! continues through them, so their own subtrees get correct levels as well.

use std::collections::{HashMap, VecDeque};

use log::warn;

use super::error::{Result, RoadmapError};
use super::model::{Node, Roadmap};
use super::normalize::Normalized;

/// Counts of every silent correction made while normalizing and repairing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
	/// Nodes that arrived without a usable id.
	pub synthesized_ids: usize,
	/// Nodes whose id was already taken by an earlier node.
	pub duplicate_ids: usize,
	/// Required fields that were missing or had the wrong type.
	pub defaulted_fields: usize,
	/// Child references naming no node.
	pub dangling_references: usize,
	/// Nodes whose stored level disagreed with their distance from the root.
	pub depth_corrections: usize,
	/// Child references dropped because the child already had a parent.
	pub redundant_references: usize,
	/// Unreachable nodes attached under the root.
	pub orphans_reattached: usize,
}

impl RepairReport {
	/// Sum of all corrections.
	pub fn total(&self) -> usize {
		self.synthesized_ids
			+ self.duplicate_ids
			+ self.defaulted_fields
			+ self.dangling_references
			+ self.depth_corrections
			+ self.redundant_references
			+ self.orphans_reattached
	}
}

/// Picks the unique level-0 node, falling back to the first node when there
/// is no level-0 node or several of them.
fn choose_root(nodes: &[Node]) -> usize {
	let mut zeros = nodes.iter().enumerate().filter(|(_, n)| n.level == 0);
	match (zeros.next(), zeros.next()) {
		(Some((i, _)), None) => i,
		_ => 0,
	}
}

/// Enforces `level(child) == level(parent) + 1` on every edge and reattaches
/// orphans. Fails only when there is nothing to repair.
pub fn repair(document: Normalized, report: &mut RepairReport) -> Result<Roadmap> {
	let Normalized { title, mut nodes } = document;
	if nodes.is_empty() {
		return Err(RoadmapError::Empty);
	}

	let index: HashMap<String, usize> = nodes
		.iter()
		.enumerate()
		.map(|(i, node)| (node.id.clone(), i))
		.collect();
	let root = choose_root(&nodes);

	let mut walk = Walk {
		visited: vec![false; nodes.len()],
		queue: VecDeque::new(),
	};
	walk.enqueue(root, 0);
	walk.drain(&mut nodes, &index, report);

	for i in 0..nodes.len() {
		if walk.visited[i] {
			continue;
		}
		warn!("Orphaned node rescued: {}", nodes[i].label);
		let orphan_id = nodes[i].id.clone();
		nodes[root].children.push(orphan_id);
		report.orphans_reattached += 1;
		walk.enqueue(i, 1);
		walk.drain(&mut nodes, &index, report);
	}

	if report.depth_corrections > 0 {
		warn!(
			"Roadmap auto-healed: corrected levels for {} nodes",
			report.depth_corrections
		);
	}

	Ok(Roadmap::from_repaired(title, nodes, root))
}

struct Walk {
	visited: Vec<bool>,
	queue: VecDeque<(usize, u32)>,
}

impl Walk {
	fn enqueue(&mut self, i: usize, depth: u32) {
		self.visited[i] = true;
		self.queue.push_back((i, depth));
	}

	fn drain(&mut self, nodes: &mut [Node], index: &HashMap<String, usize>, report: &mut RepairReport) {
		while let Some((i, depth)) = self.queue.pop_front() {
			let node = &mut nodes[i];
			if node.level != depth {
				node.level = depth;
				report.depth_corrections += 1;
			}

			let mut children = std::mem::take(&mut node.children);
			children.retain(|child| {
				// The normalizer already dropped unknown ids.
				let Some(&c) = index.get(child) else {
					report.dangling_references += 1;
					return false;
				};
				if self.visited[c] {
					report.redundant_references += 1;
					return false;
				}
				self.enqueue(c, depth + 1);
				true
			});
			nodes[i].children = children;
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::{Value, json};

	use super::*;
	use crate::roadmap::normalize::normalize;

	fn repaired(document: Value) -> (Roadmap, RepairReport) {
		let mut report = RepairReport::default();
		let normalized = normalize(document, &mut report).expect("valid shape");
		let roadmap = repair(normalized, &mut report).expect("non-empty");
		(roadmap, report)
	}

	fn level(roadmap: &Roadmap, id: &str) -> u32 {
		roadmap.node(id).expect("node exists").level
	}

	fn assert_tree(roadmap: &Roadmap) {
		assert_eq!(roadmap.root().level, 0);
		let mut seen = vec![roadmap.root().id.as_str()];
		seen.extend(roadmap.descendants(&roadmap.root().id));
		assert_eq!(seen.len(), roadmap.len(), "every node reachable exactly once");
		for edge in roadmap.edges() {
			let parent = roadmap.node(edge.source).expect("source");
			let child = roadmap.node(edge.target).expect("target");
			assert_eq!(child.level, parent.level + 1);
		}
	}

	#[test]
	fn orphan_is_reattached_under_root() {
		let (roadmap, report) = repaired(json!({
			"nodes": [
				{ "id": "root", "level": 0, "children": ["x"] },
				{ "id": "x", "level": 5 },
				{ "id": "y", "level": 2 }
			]
		}));
		assert_eq!(level(&roadmap, "root"), 0);
		assert_eq!(level(&roadmap, "x"), 1);
		assert_eq!(level(&roadmap, "y"), 1);
		assert_eq!(roadmap.root().children, vec!["x".to_string(), "y".to_string()]);
		assert_eq!(report.orphans_reattached, 1);
		assert_eq!(report.depth_corrections, 2);
		assert_tree(&roadmap);
	}

	#[test]
	fn walk_continues_through_reattached_orphans() {
		let (roadmap, _) = repaired(json!({
			"nodes": [
				{ "id": "root", "level": 0 },
				{ "id": "lost", "level": 3, "children": ["deep"] },
				{ "id": "deep", "level": 9, "children": ["deeper"] },
				{ "id": "deeper", "level": 0 }
			]
		}));
		assert_eq!(level(&roadmap, "lost"), 1);
		assert_eq!(level(&roadmap, "deep"), 2);
		assert_eq!(level(&roadmap, "deeper"), 3);
		// "deep" is reached through "lost", so only one node is reattached.
		assert_eq!(roadmap.root().children, vec!["lost".to_string()]);
		assert_tree(&roadmap);
	}

	#[test]
	fn skipped_levels_are_pulled_up() {
		let (roadmap, _) = repaired(json!({
			"nodes": [
				{ "id": "a", "level": 0, "children": ["b"] },
				{ "id": "b", "level": 2, "children": ["c"] },
				{ "id": "c", "level": 4 }
			]
		}));
		assert_eq!(level(&roadmap, "b"), 1);
		assert_eq!(level(&roadmap, "c"), 2);
	}

	#[test]
	fn first_node_is_root_without_a_unique_level_zero() {
		let (roadmap, _) = repaired(json!({
			"nodes": [
				{ "id": "first", "level": 2, "children": ["second"] },
				{ "id": "second", "level": 0 },
				{ "id": "third", "level": 0 }
			]
		}));
		assert_eq!(roadmap.root().id, "first");
		assert_eq!(level(&roadmap, "second"), 1);
		assert_eq!(level(&roadmap, "third"), 1);
		assert_tree(&roadmap);

		let (roadmap, _) = repaired(json!({
			"nodes": [
				{ "id": "leaf", "level": 1 },
				{ "id": "goal", "level": 0, "children": ["leaf"] }
			]
		}));
		assert_eq!(roadmap.root().id, "goal");
	}

	#[test]
	fn shared_children_and_cycles_become_a_tree() {
		let (roadmap, report) = repaired(json!({
			"nodes": [
				{ "id": "r", "level": 0, "children": ["a", "b", "r"] },
				{ "id": "a", "level": 1, "children": ["c", "c"] },
				{ "id": "b", "level": 1, "children": ["c", "r"] },
				{ "id": "c", "level": 2, "children": ["a"] }
			]
		}));
		assert_eq!(roadmap.node("a").unwrap().children, vec!["c".to_string()]);
		assert!(roadmap.node("b").unwrap().children.is_empty());
		assert!(roadmap.node("c").unwrap().children.is_empty());
		assert_eq!(report.redundant_references, 5);
		assert_tree(&roadmap);
	}

	#[test]
	fn single_root_is_a_valid_tree() {
		let (roadmap, report) = repaired(json!({
			"title": "Solo",
			"nodes": [{ "id": "only", "label": "Only", "description": "", "level": 0, "children": [], "resources": [] }]
		}));
		assert_eq!(roadmap.len(), 1);
		assert_eq!(roadmap.edges().count(), 0);
		assert_eq!(report.total(), 0);
	}

	#[test]
	fn empty_node_list_is_fatal() {
		let mut report = RepairReport::default();
		let normalized = normalize(json!({ "nodes": [] }), &mut report).unwrap();
		assert!(matches!(repair(normalized, &mut report), Err(RoadmapError::Empty)));
	}

	#[test]
	fn repair_is_idempotent() {
		let (first, _) = repaired(json!({
			"title": "Guitar",
			"nodes": [
				{ "id": "g", "label": "Guitar", "level": 3, "children": ["chords", "ghost"] },
				{ "id": "chords", "level": 7, "children": ["barre"] },
				{ "label": "Scales", "level": "x" },
				{ "id": "barre", "level": 1, "timeEstimate": "2 weeks" }
			]
		}));
		let (second, report) = repaired(first.to_document());
		assert_eq!(second, first);
		assert_eq!(report.total(), 0);
	}
}
