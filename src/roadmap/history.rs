//! Recently viewed roadmaps with their progress.

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use super::completion::CompletionStats;
use super::session::{Generation, Snapshot};

/// Number of roadmaps kept, newest first.
pub const HISTORY_CAPACITY: usize = 20;

/// Receives every repaired roadmap and every completion change.
pub trait HistorySink {
	/// Called with the generation the snapshot belongs to.
	fn record(&mut self, generation: Generation, snapshot: &Snapshot);
}

/// A remembered roadmap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
	/// Generation that last wrote this entry.
	pub id: Generation,
	/// Milliseconds since the epoch at creation.
	pub timestamp: f64,
	/// Document plus completed ids.
	#[serde(flatten)]
	pub snapshot: Snapshot,
}

impl HistoryEntry {
	/// Document title, if the document carries one.
	pub fn title(&self) -> &str {
		self.snapshot.document["title"].as_str().unwrap_or_default()
	}

	/// Progress of this entry.
	pub fn stats(&self) -> CompletionStats {
		let total = self.snapshot.document["nodes"]
			.as_array()
			.map_or(0, Vec::len);
		CompletionStats::new(self.snapshot.completed_nodes.len(), total)
	}
}

/// In-memory history, newest first and bounded.
///
/// A snapshot for a generation already in the log updates that entry. A
/// snapshot whose document matches an existing entry (a history item being
/// reopened) moves that entry to the front instead of duplicating it.
pub struct HistoryLog {
	entries: VecDeque<HistoryEntry>,
	capacity: usize,
	clock: fn() -> f64,
}

impl HistoryLog {
	/// Empty log holding [`HISTORY_CAPACITY`] entries, timestamped by `clock`.
	pub fn new(clock: fn() -> f64) -> Self {
		Self::with_capacity(HISTORY_CAPACITY, clock)
	}

	/// Empty log with a custom bound.
	pub fn with_capacity(capacity: usize, clock: fn() -> f64) -> Self {
		Self {
			entries: VecDeque::with_capacity(capacity),
			capacity,
			clock,
		}
	}

	/// Entries, newest first.
	pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
		self.entries.iter()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the log is empty.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entry by id.
	pub fn get(&self, id: Generation) -> Option<&HistoryEntry> {
		self.entries.iter().find(|e| e.id == id)
	}

	/// Deletes one entry.
	pub fn remove(&mut self, id: Generation) -> Option<HistoryEntry> {
		let pos = self.entries.iter().position(|e| e.id == id)?;
		self.entries.remove(pos)
	}

	/// Deletes everything.
	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

impl HistorySink for HistoryLog {
	fn record(&mut self, generation: Generation, snapshot: &Snapshot) {
		if let Some(entry) = self.entries.iter_mut().find(|e| e.id == generation) {
			entry.snapshot.completed_nodes = snapshot.completed_nodes.clone();
			return;
		}

		let reopened = self
			.entries
			.iter()
			.position(|e| e.snapshot.document == snapshot.document);
		let entry = match reopened.and_then(|pos| self.entries.remove(pos)) {
			Some(mut entry) => {
				debug!("Reopened history entry {} as {generation}", entry.id);
				entry.id = generation;
				entry.snapshot.completed_nodes = snapshot.completed_nodes.clone();
				entry
			}
			None => HistoryEntry {
				id: generation,
				timestamp: (self.clock)(),
				snapshot: snapshot.clone(),
			},
		};
		self.entries.push_front(entry);
		self.entries.truncate(self.capacity);
	}
}
