//! The owner of the current roadmap.
//!
//! Every request and every load advances a generation counter. A result is
//! applied only if it carries the newest ticket, so a slow response to an old
//! request can never overwrite what the user is looking at. The layout engine
//! keys its state by the same [`Generation`].

use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::completion::{CompletionStats, CompletionTracker};
use super::error::Result;
use super::history::HistorySink;
use super::model::Roadmap;
use super::repair::RepairReport;
use super::repair_document;

/// Identity of an applied roadmap. Strictly increasing within a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "gen-{}", self.0)
	}
}

/// Handed out when a generation request starts; redeemed when it finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct GenerationTicket(Generation);

impl GenerationTicket {
	/// The generation the roadmap will get if this ticket is still current.
	pub fn generation(&self) -> Generation {
		self.0
	}
}

/// The `(document, completion set)` pair handed to persistence and accepted
/// back on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
	/// Repaired document in generator wire format.
	pub document: Value,
	/// Completed node ids, sorted.
	#[serde(default)]
	pub completed_nodes: Vec<String>,
}

/// Outcome of [`RoadmapSession::apply_result`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
	/// The roadmap replaced the previous one.
	Current(RepairReport),
	/// A newer request or navigation superseded this result; nothing changed.
	Stale,
}

/// Current roadmap, its completion set and selection.
pub struct RoadmapSession<H> {
	latest: Generation,
	applied: Generation,
	roadmap: Option<Arc<Roadmap>>,
	completion: CompletionTracker,
	selected: Option<String>,
	history: H,
}

impl<H: HistorySink> RoadmapSession<H> {
	/// Empty session persisting into `history`.
	pub fn new(history: H) -> Self {
		Self {
			latest: Generation::default(),
			applied: Generation::default(),
			roadmap: None,
			completion: CompletionTracker::new(),
			selected: None,
			history,
		}
	}

	/// Starts a generation request, invalidating any still in flight.
	pub fn begin_request(&mut self) -> GenerationTicket {
		GenerationTicket(self.advance())
	}

	/// Invalidates in-flight requests, e.g. when the user navigates away.
	pub fn abandon(&mut self) {
		let superseded = self.advance();
		debug!("Abandoned in-flight requests up to {superseded}");
	}

	/// Applies a generator result if `ticket` is still the newest one.
	///
	/// Stale results are dropped before parsing so they cannot surface errors
	/// either. A fresh roadmap starts with no completions and no selection.
	pub fn apply_result(&mut self, ticket: GenerationTicket, document: Value) -> Result<Applied> {
		if ticket.0 != self.latest {
			debug!("Discarding stale result for {} (latest {})", ticket.0, self.latest);
			return Ok(Applied::Stale);
		}
		let repaired = repair_document(document)?;
		self.install(ticket.0, repaired.roadmap, CompletionTracker::new());
		Ok(Applied::Current(repaired.report))
	}

	/// Loads a persisted snapshot, re-running the full repair over it.
	pub fn load(&mut self, snapshot: Snapshot) -> Result<RepairReport> {
		let repaired = repair_document(snapshot.document)?;
		let completion = CompletionTracker::restore(&repaired.roadmap, snapshot.completed_nodes);
		let generation = self.advance();
		self.install(generation, repaired.roadmap, completion);
		Ok(repaired.report)
	}

	fn advance(&mut self) -> Generation {
		self.latest = Generation(self.latest.0 + 1);
		self.latest
	}

	fn install(&mut self, generation: Generation, roadmap: Roadmap, completion: CompletionTracker) {
		info!("Applied roadmap \"{}\" as {generation}", roadmap.title());
		self.applied = generation;
		self.roadmap = Some(Arc::new(roadmap));
		self.completion = completion;
		self.selected = None;
		self.persist();
	}

	fn persist(&mut self) {
		if let Some(snapshot) = self.snapshot() {
			self.history.record(self.applied, &snapshot);
		}
	}

	/// Generation of the roadmap currently applied.
	pub fn generation(&self) -> Generation {
		self.applied
	}

	/// The applied roadmap, if any.
	pub fn roadmap(&self) -> Option<&Arc<Roadmap>> {
		self.roadmap.as_ref()
	}

	/// Toggles completion of `id` and its subtree, persisting the result.
	/// Returns the node's new state; `None` if nothing is loaded or the id is
	/// unknown.
	pub fn toggle(&mut self, id: &str) -> Option<bool> {
		let roadmap = self.roadmap.as_ref()?;
		let done = self.completion.toggle(roadmap, id)?;
		self.persist();
		Some(done)
	}

	/// Whether `id` is completed.
	pub fn is_complete(&self, id: &str) -> bool {
		self.completion.is_complete(id)
	}

	/// The completion set.
	pub fn completion(&self) -> &CompletionTracker {
		&self.completion
	}

	/// Progress of the applied roadmap.
	pub fn stats(&self) -> CompletionStats {
		match &self.roadmap {
			Some(roadmap) => self.completion.stats(roadmap),
			None => CompletionStats::default(),
		}
	}

	/// Selects a node for the detail panel, or clears the selection. Unknown
	/// ids clear it too. No layout effect.
	pub fn select_node(&mut self, id: Option<&str>) -> Option<&str> {
		self.selected = id
			.filter(|id| self.roadmap.as_ref().is_some_and(|r| r.contains(id)))
			.map(str::to_string);
		self.selected.as_deref()
	}

	/// Currently selected node id.
	pub fn selected(&self) -> Option<&str> {
		self.selected.as_deref()
	}

	/// The pair persistence stores, if a roadmap is applied.
	pub fn snapshot(&self) -> Option<Snapshot> {
		let roadmap = self.roadmap.as_ref()?;
		Some(Snapshot {
			document: roadmap.to_document(),
			completed_nodes: self.completion.to_sorted_vec(),
		})
	}

	/// The persistence sink.
	pub fn history(&self) -> &H {
		&self.history
	}

	/// Mutable access to the sink, e.g. to forget entries.
	pub fn history_mut(&mut self) -> &mut H {
		&mut self.history
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::roadmap::error::RoadmapError;
	use crate::roadmap::history::HistoryLog;

	#[derive(Default)]
	struct Recorder(Vec<(Generation, Snapshot)>);

	impl HistorySink for Recorder {
		fn record(&mut self, generation: Generation, snapshot: &Snapshot) {
			self.0.push((generation, snapshot.clone()));
		}
	}

	fn document(title: &str) -> Value {
		json!({
			"title": title,
			"nodes": [
				{ "id": "goal", "level": 0, "children": ["step"] },
				{ "id": "step", "level": 1 }
			]
		})
	}

	#[test]
	fn applies_current_result_and_persists() {
		let mut session = RoadmapSession::new(Recorder::default());
		let ticket = session.begin_request();
		let applied = session.apply_result(ticket, document("A")).unwrap();

		assert!(matches!(applied, Applied::Current(_)));
		assert_eq!(session.generation(), ticket.generation());
		assert_eq!(session.roadmap().unwrap().title(), "A");
		assert_eq!(session.history().0.len(), 1);
		assert!(session.history().0[0].1.completed_nodes.is_empty());
	}

	#[test]
	fn stale_results_are_discarded() {
		let mut session = RoadmapSession::new(Recorder::default());
		let old = session.begin_request();
		let new = session.begin_request();

		assert_eq!(session.apply_result(old, document("old")).unwrap(), Applied::Stale);
		assert!(session.roadmap().is_none());

		session.apply_result(new, document("new")).unwrap();
		assert_eq!(session.apply_result(old, document("old")).unwrap(), Applied::Stale);
		assert_eq!(session.roadmap().unwrap().title(), "new");
		assert_eq!(session.history().0.len(), 1);
	}

	#[test]
	fn abandoned_requests_never_apply() {
		let mut session = RoadmapSession::new(Recorder::default());
		let ticket = session.begin_request();
		session.abandon();
		assert_eq!(session.apply_result(ticket, document("late")).unwrap(), Applied::Stale);
		// Stale results are not even parsed.
		let ticket = session.begin_request();
		session.abandon();
		assert_eq!(session.apply_result(ticket, json!("garbage")).unwrap(), Applied::Stale);
	}

	#[test]
	fn fatal_input_surfaces_and_keeps_previous_roadmap() {
		let mut session = RoadmapSession::new(Recorder::default());
		let ticket = session.begin_request();
		session.apply_result(ticket, document("kept")).unwrap();

		let ticket = session.begin_request();
		let err = session.apply_result(ticket, json!({ "nodes": [] })).unwrap_err();
		assert!(matches!(err, RoadmapError::Empty));
		assert_eq!(session.roadmap().unwrap().title(), "kept");
	}

	#[test]
	fn toggle_persists_and_new_generation_resets_completion() {
		let mut session = RoadmapSession::new(Recorder::default());
		let ticket = session.begin_request();
		session.apply_result(ticket, document("A")).unwrap();

		assert_eq!(session.toggle("goal"), Some(true));
		assert!(session.is_complete("step"));
		assert_eq!(session.stats().percentage, 100);
		let (_, last) = session.history().0.last().unwrap();
		assert_eq!(last.completed_nodes, vec!["goal".to_string(), "step".to_string()]);

		let ticket = session.begin_request();
		session.apply_result(ticket, document("B")).unwrap();
		assert!(!session.is_complete("goal"));
		assert_eq!(session.stats().completed, 0);
	}

	#[test]
	fn load_round_trips_a_snapshot() {
		let mut session = RoadmapSession::new(Recorder::default());
		let ticket = session.begin_request();
		session.apply_result(ticket, document("A")).unwrap();
		session.toggle("step");
		let snapshot = session.snapshot().unwrap();
		let before = session.generation();

		let mut restored = RoadmapSession::new(Recorder::default());
		let report = restored.load(snapshot).unwrap();
		assert_eq!(report.total(), 0);
		assert!(restored.is_complete("step"));
		assert!(!restored.is_complete("goal"));

		session.load(session.snapshot().unwrap()).unwrap();
		assert!(session.generation() > before);
	}

	#[test]
	fn cleared_history_picks_up_the_next_change() {
		let mut session = RoadmapSession::new(HistoryLog::new(|| 0.0));
		let ticket = session.begin_request();
		session.apply_result(ticket, document("A")).unwrap();
		let current = session.generation();

		session.history_mut().clear();
		assert!(session.history().is_empty());

		session.toggle("step");
		let entry = session.history().get(current).unwrap();
		assert_eq!(entry.snapshot.completed_nodes, vec!["step".to_string()]);

		assert!(session.history_mut().remove(current).is_some());
		assert!(session.history().is_empty());
		assert_eq!(session.roadmap().unwrap().title(), "A");
	}

	#[test]
	fn selection_is_validated() {
		let mut session = RoadmapSession::new(Recorder::default());
		assert_eq!(session.select_node(Some("goal")), None);
		let ticket = session.begin_request();
		session.apply_result(ticket, document("A")).unwrap();
		assert_eq!(session.select_node(Some("goal")), Some("goal"));
		assert_eq!(session.select_node(Some("nope")), None);
		session.select_node(Some("step"));
		session.select_node(None);
		assert_eq!(session.selected(), None);
	}
}
