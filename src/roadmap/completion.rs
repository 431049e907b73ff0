//! Which steps of a roadmap are done. Completing a step completes its whole
//! subtree; parents are never completed implicitly.

use std::collections::HashSet;

use serde::Serialize;

use super::model::Roadmap;

/// Aggregate progress shown next to the graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
	/// Completed nodes.
	pub completed: usize,
	/// All nodes.
	pub total: usize,
	/// `round(completed / total * 100)`, zero for an empty roadmap.
	pub percentage: u32,
}

impl CompletionStats {
	/// Computes the percentage, treating `total == 0` as 0%.
	pub fn new(completed: usize, total: usize) -> Self {
		let percentage = if total == 0 {
			0
		} else {
			(completed as f64 / total as f64 * 100.0).round() as u32
		};
		Self {
			completed,
			total,
			percentage,
		}
	}
}

/// The set of finished steps.
///
/// Toggling cascades downward only: finishing a step finishes its whole
/// subtree, but finishing every child never finishes the parent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionTracker {
	done: HashSet<String>,
}

impl CompletionTracker {
	/// Empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuilds a set from persisted ids, dropping any the roadmap no longer has.
	pub fn restore<I, S>(roadmap: &Roadmap, ids: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let done = ids
			.into_iter()
			.map(Into::into)
			.filter(|id| roadmap.contains(id))
			.collect();
		Self { done }
	}

	/// Flips `id` and its descendants to the opposite of `id`'s current state.
	/// Returns the new state of `id`, or `None` if the roadmap has no such node.
	pub fn toggle(&mut self, roadmap: &Roadmap, id: &str) -> Option<bool> {
		let node = roadmap.node(id)?;
		let completing = !self.done.contains(id);
		let subtree = std::iter::once(node.id.as_str()).chain(roadmap.descendants(id));
		if completing {
			self.done.extend(subtree.map(str::to_string));
		} else {
			for member in subtree {
				self.done.remove(member);
			}
		}
		Some(completing)
	}

	/// Membership test.
	pub fn is_complete(&self, id: &str) -> bool {
		self.done.contains(id)
	}

	/// Progress against `roadmap`.
	pub fn stats(&self, roadmap: &Roadmap) -> CompletionStats {
		CompletionStats::new(self.done.len(), roadmap.len())
	}

	/// Read access for renderers.
	pub fn completed(&self) -> &HashSet<String> {
		&self.done
	}

	/// Completed ids in a stable order, for persistence.
	pub fn to_sorted_vec(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.done.iter().cloned().collect();
		ids.sort();
		ids
	}

	/// Forgets everything.
	pub fn clear(&mut self) {
		self.done.clear();
	}
}
