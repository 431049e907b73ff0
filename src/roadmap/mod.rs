//! The roadmap document: parsing, repair into a strict tree, completion
//! tracking and the generation-keyed session that owns them.

pub mod completion;
pub mod error;
pub mod history;
pub mod model;
pub mod normalize;
pub mod repair;
pub mod session;

use log::info;
use serde_json::Value;

pub use completion::{CompletionStats, CompletionTracker};
pub use error::{Result, RoadmapError};
pub use history::{HistoryEntry, HistoryLog, HistorySink};
pub use model::{Edge, Node, Resource, Roadmap};
pub use repair::RepairReport;
pub use session::{Applied, Generation, GenerationTicket, RoadmapSession, Snapshot};

/// Output of the full pipeline.
#[derive(Clone, Debug)]
pub struct Repaired {
	/// The valid tree.
	pub roadmap: Roadmap,
	/// What had to be fixed to get there.
	pub report: RepairReport,
}

/// Runs the normalizer and the hierarchy repairer over a parsed document.
///
/// Either returns a valid tree or fails; it never returns a partially
/// repaired one.
pub fn repair_document(document: Value) -> Result<Repaired> {
	let mut report = RepairReport::default();
	let normalized = normalize::normalize(document, &mut report)?;
	let roadmap = repair::repair(normalized, &mut report)?;
	info!(
		"Repaired roadmap \"{}\": {} nodes, {} corrections",
		roadmap.title(),
		roadmap.len(),
		report.total()
	);
	Ok(Repaired { roadmap, report })
}

/// [`repair_document`] over raw generator text.
pub fn repair_text(text: &str) -> Result<Repaired> {
	repair_document(normalize::parse_document(text)?)
}
